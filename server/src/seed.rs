//! First-run sample data.

use tokio::sync::OnceCell;

use crate::context::{StorageError, TodoContext};
use crate::model::{TodoItem, TodoValue};

/// Seeds the store at most once for its lifetime.
///
/// The check-and-insert runs inside `OnceCell::get_or_try_init`, so concurrent
/// first requests wait on the same initialization instead of racing. A failed
/// attempt leaves the cell empty and the next request retries.
#[derive(Debug)]
pub struct Initializer {
    enabled: bool,
    done: OnceCell<()>,
}

impl Initializer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            done: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.done.initialized()
    }

    pub async fn ensure_seeded(&self, ctx: &TodoContext) -> Result<(), StorageError> {
        if !self.enabled {
            return Ok(());
        }
        self.done
            .get_or_try_init(|| async {
                if ctx.item_count().await == 0 {
                    let item = ctx.add_item(sample_item()).await?;
                    tracing::info!(item_id = item.id, "seeded sample item");
                }
                Ok::<(), StorageError>(())
            })
            .await?;
        Ok(())
    }
}

pub fn sample_item() -> TodoItem {
    TodoItem::new(1, "Item1", true).with_values(vec![TodoValue::new(1, 22.0)])
}

use tokio::net::TcpListener;
use todo_server::{logging, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging()?;
    let config = ServerConfig::from_env()?;

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, seed = config.seed, "listening");
    todo_server::run(listener, &config).await?;
    Ok(())
}

use tracing::info;
use tracing_subscriber::EnvFilter;

use taskwire_server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,taskwire_server=debug")),
        )
        .init();

    info!("Starting taskwire server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(
        listen = %config.listen_addr,
        policy = ?config.identity_policy,
        "Loaded configuration"
    );

    let server = Server::new(config)?;
    let listener = server.bind().await?;

    // Ctrl-C triggers a clean shutdown: connected clients get a final
    // server_shutdown frame before their sockets close.
    let handle = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            handle.shutdown();
        }
    });

    server.serve(listener).await?;
    Ok(())
}

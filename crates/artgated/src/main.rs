use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("artgated starting");

    let config = config::Config::from_env();
    let handle = engine::spawn_engine(&config)?;
    let service = dbus_interface::GateService::new(handle);

    let _conn = zbus::connection::Builder::session()?
        .name("org.artgate.Gate1")?
        .serve_at("/org/artgate/Gate1", service)?
        .build()
        .await?;

    tracing::info!("artgated ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("artgated shutting down");

    Ok(())
}

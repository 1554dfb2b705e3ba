use medibook::api::types::ApiContext;
use medibook::api::server::start_server;
use medibook::config::Config;
use medibook::db::Db;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    medibook::init_tracing();

    let config = Config::from_env();
    std::fs::create_dir_all(&config.data_dir)?;
    std::fs::create_dir_all(config.uploads_dir())?;

    tracing::info!(
        version = medibook::config::APP_VERSION,
        data_dir = %config.data_dir.display(),
        port = config.port,
        "Starting Medibook"
    );

    let db = Db::open(&config.db_path())?;
    let ctx = ApiContext::new(db, config);
    let mut server = start_server(ctx).await?;
    tracing::info!(addr = %server.addr, "Listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    server.shutdown();
    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use clap::Parser;
use tracing::info;

use tenant_orchestrator_app::AppStateBuilder;
use tenant_orchestrator_app::adapters::{FileChangeFeedSink, SqliteStore};
use tenant_orchestrator_gateway::{create_account_factory, create_delivery_service};
use tenant_orchestrator_web::config::ServerConfig;
use tenant_orchestrator_web::{handlers, logging};

#[derive(Parser, Debug)]
#[command(name = "tenant-orchestrator", about = "Tenant account provisioning orchestrator")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        long,
        env = "TENANT_ORCHESTRATOR_CONFIG",
        default_value = "config/tenant-orchestrator.toml"
    )]
    config: PathBuf,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::load(&cli.config)?;
    let _guard = logging::init(&config.logging)?;
    info!("Starting tenant orchestrator: {}", config.summary());

    let store = Arc::new(
        SqliteStore::new(&config.storage.database_path)
            .await
            .context("failed to open database")?,
    );
    let account_factory = create_account_factory(config.gateway.account_factory.clone())?;
    let delivery = create_delivery_service(config.gateway.delivery.clone())?;

    let mut builder = AppStateBuilder::new()
        .account_repository(store.clone())
        .workflow_repository(store)
        .account_factory(account_factory)
        .delivery(delivery)
        .config(config.orchestrator.clone());
    if let Some(dir) = &config.storage.change_feed_dir {
        builder = builder.change_feed_sink(Arc::new(FileChangeFeedSink::new(dir)));
    }
    let state = builder.build()?;
    state.run_startup().await?;
    let state = web::Data::new(state);

    let app_state = state.clone();
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    });
    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    info!("Listening on {}", config.server.bind);
    server.bind(config.server.bind)?.run().await?;
    info!("Server stopped");

    // Instances still running are failed by the next startup; suspended ones resume normally
    state.shutdown().await;
    Ok(())
}

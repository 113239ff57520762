//! Herald API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use herald_common::config::AppConfig;
use herald_common::db;
use herald_common::types::Template;
use herald_delivery::ledger::PgMessageLedger;
use herald_delivery::loaders::cloud_controller::{CloudControllerClient, PlatformDirectory};
use herald_delivery::loaders::uaa::UaaClient;
use herald_delivery::loaders::{FallbackTemplateLoader, Loaders, NoOverrides};
use herald_delivery::transport::SmtpMailer;
use herald_delivery::{DeliverySettings, DeliverySystem};

use herald_api::routes::create_router;
use herald_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("herald_api=debug,herald_delivery=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting Herald API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create database connection pool
    let pool = db::create_pool(&config).await?;
    db::migrate(&pool).await?;

    // External collaborators
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let uaa = UaaClient::new(
        http.clone(),
        &config.uaa_url,
        &config.uaa_client_id,
        &config.uaa_client_secret,
    );
    let cloud_controller = CloudControllerClient::new(http, &config.cc_url);
    let default_template = Template {
        subject: config.default_subject.clone(),
        text: config.default_text.clone(),
        html: config.default_html.clone(),
    };

    let loaders = Loaders {
        tokens: Arc::new(uaa.clone()),
        users: Arc::new(uaa.clone()),
        members: Arc::new(PlatformDirectory::new(cloud_controller, uaa)),
        templates: Arc::new(FallbackTemplateLoader::new(
            Arc::new(NoOverrides),
            default_template,
        )),
    };

    let ledger = Arc::new(PgMessageLedger::new(pool));
    let transport = Arc::new(SmtpMailer::from_config(&config)?);

    // Start the delivery pipeline
    let system = Arc::new(DeliverySystem::start(
        DeliverySettings::from(&config),
        loaders,
        ledger,
        transport,
    ));

    // Build router
    let app = create_router(AppState::new(Arc::clone(&system)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let workers finish what was already accepted
    system.shutdown().await;
    tracing::info!("Herald API server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

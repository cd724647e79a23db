use referral_intake_service::{LogFormat, ServiceConfig, create_app};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up a local .env when present
    dotenvy::dotenv().ok();

    let config = ServiceConfig::from_env();
    init_tracing(config.log_format);

    let app = create_app(&config).await?;
    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    let addr = listener.local_addr()?;

    info!("Referral Intake Service starting on {}", addr);
    info!(
        ai_extraction = config.extraction.ai_enabled(),
        model = %config.extraction.model,
        persistent = config.database_url.is_some(),
        "Configuration loaded"
    );
    info!("Parse endpoint: POST http://{}/parse", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "referral_intake_service=info,referral_flow=info,tower_http=info".into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

use std::sync::Arc;

use call_assist::config::Config;
use call_assist::conversation::ConversationEngine;
use call_assist::http::{self, AppState};
use call_assist::ledger::OrderLedger;
use call_assist::services::Services;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export CALL_ASSIST_OWNER_NAME=<name>");
        std::process::exit(1);
    });

    eprintln!("📞 Call Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Owner: {}", config.owner_name);
    eprintln!("   Mode: {:?}", config.service_mode);
    eprintln!("   API: http://0.0.0.0:{}/api", config.port);

    let services = Services::from_config(&config)?;
    let ledger = Arc::new(OrderLedger::new());
    let engine = Arc::new(ConversationEngine::new(
        services.clone(),
        ledger.clone(),
        config.owner_name.clone(),
    ));

    let app = http::routes(AppState {
        engine,
        ledger,
        notifier: services.notifier.clone(),
        api_key: config.internal_api_key.clone(),
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

use std::sync::Arc;

use coopbot::config::{BotConfig, require_env};
use coopbot::dispatch::Dispatcher;
use coopbot::faq::{FaqBackend, FaqConfig, create_assist};
use coopbot::store::LibSqlBackend;
use coopbot::transport::twilio::TwilioGateway;
use coopbot::transport::webhook;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env()?;
    if config.admin_numbers.is_empty() {
        eprintln!("Warning: COOPBOT_ADMIN_NUMBERS not set — no admin commands will work");
    }

    // ── Twilio gateway ───────────────────────────────────────────────────
    let account_sid = require_env("TWILIO_ACCOUNT_SID")?;
    let auth_token = require_env("TWILIO_AUTH_TOKEN")?;
    let from_number = require_env("TWILIO_FROM_NUMBER")?;
    let transport = Arc::new(TwilioGateway::new(
        account_sid,
        secrecy::SecretString::from(auth_token),
        from_number,
    ));

    // ── FAQ assist (optional; menu fallback without it) ──────────────────
    let faq = match std::env::var("ANTHROPIC_API_KEY") {
        Ok(api_key) => {
            let model = std::env::var("COOPBOT_FAQ_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
            let faq_config = FaqConfig {
                backend: FaqBackend::Anthropic,
                api_key: secrecy::SecretString::from(api_key),
                model,
            };
            Some(create_assist(&faq_config)?)
        }
        Err(_) => {
            eprintln!("Warning: ANTHROPIC_API_KEY not set — FAQ falls back to the help menu");
            None
        }
    };

    // ── Database ─────────────────────────────────────────────────────────
    let db_path =
        std::env::var("COOPBOT_DB_PATH").unwrap_or_else(|_| "./data/coopbot.db".to_string());
    let db = Arc::new(
        LibSqlBackend::new_local(std::path::Path::new(&db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", db_path, e);
                std::process::exit(1);
            }),
    );

    let port: u16 = std::env::var("COOPBOT_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    eprintln!("🛒 Coopbot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", db_path);
    eprintln!("   Webhook: http://0.0.0.0:{}/webhook", port);
    eprintln!("   Admins: {}", config.admin_numbers.len());

    let dispatcher = Arc::new(Dispatcher::new(
        db.clone(),
        db.clone(),
        db.clone(),
        db.clone(),
        transport,
        faq,
        config,
    ));

    let app = webhook::router(dispatcher)
        .layer(tower_http::trace::TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!(port, "Webhook server started");
    axum::serve(listener, app).await?;

    Ok(())
}

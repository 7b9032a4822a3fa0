use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};
use tucl_bot::bot::handlers::BotContext;
use tucl_bot::bot::{runner, sessions};
use tucl_bot::config::{self, Settings};
use tucl_bot::health;
use tucl_bot::store::SettingsStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    init_logging();

    info!("Starting TUCL Bot...");

    let settings = init_settings();

    std::fs::create_dir_all(config::SESSIONS_DIR)?;

    let store = SettingsStore::load(config::SETTINGS_FILE);

    // Liveness probes are answered even while Telegram is unreachable.
    tokio::spawn(async {
        if let Err(e) = health::serve(config::HEALTH_PORT).await {
            error!("Health-check server failed: {e}");
        }
    });

    let mut ctx = BotContext {
        registry: sessions::Registry::new(config::LOGIN_ATTEMPT_TTL),
        store,
    };

    tokio::select! {
        () = runner::run(&settings, &mut ctx) => {}
        _ = tokio::signal::ctrl_c() => info!("🛑 Manual shutdown"),
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

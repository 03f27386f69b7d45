use tracing::{error, info};

use chat_relay::{ChatHub, Config, SessionController, WebServer};

#[tokio::main]
async fn main() {
    // Load configuration
    let mut config = match Config::load("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    config.apply_env_overrides();

    // Initialize logging
    if let Err(e) = chat_relay::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        chat_relay::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("{e}");
        std::process::exit(1);
    }

    info!(
        "Chat relay configured on {}:{}",
        config.server.host, config.server.port
    );

    let (hub, _hub_task) = ChatHub::spawn(SessionController::new(&config.chat));

    let server = match WebServer::new(&config.server, hub) {
        Ok(server) => server,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!("Server stopped: {e}");
        std::process::exit(1);
    }
}

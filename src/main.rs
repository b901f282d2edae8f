use std::sync::Arc;

use fileserver::config::{self, AppState};
use fileserver::{logger, server};

const DEFAULT_CONFIG: &str = "config";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match std::env::args().nth(1) {
        Some(arg) if arg == "-v" || arg == "--version" => {
            println!("{}", config::default_server_name());
            return Ok(());
        }
        Some(arg) if arg == "-h" || arg == "--help" => {
            println!("Usage: fileserver [CONFIG_FILE]");
            println!("  CONFIG_FILE  configuration file (default: {DEFAULT_CONFIG}.toml)");
            println!("  Environment overrides: FILESERVER__<SECTION>__<KEY>, e.g. FILESERVER__SERVER__PORT=8080");
            return Ok(());
        }
        Some(path) => path,
        None => DEFAULT_CONFIG.to_string(),
    };

    let cfg = config::Config::load_from(&config_path)?;
    cfg.validate()?;
    logger::init(&cfg)?;

    // Create the Tokio runtime, sizing worker threads from config
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_reusable_listener(addr)?;
    let state = Arc::new(AppState::new(&cfg));

    logger::log_server_start(&addr, &cfg);
    server::start_server_loop(listener, state, server::shutdown_signal()).await;
    Ok(())
}

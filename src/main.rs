use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};

mod config;
mod handler;
mod http;
mod logger;
mod server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
    let cfg = config::Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    // Worker threads default to the number of CPU cores
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
    let listener = server::create_listener(addr)?;
    let dispatcher = Arc::new(handler::Dispatcher::new(&cfg)?);
    let settings = server::ConnectionSettings::from_config(&cfg);
    let active_connections = Arc::new(AtomicUsize::new(0));

    let shutdown = Arc::new(Notify::new());
    server::start_signal_handler(Arc::clone(&shutdown))?;
    let (drain_tx, drain_rx) = watch::channel(false);

    logger::log_server_start(&addr, &cfg);

    server::start_server_loop(
        listener,
        dispatcher,
        settings,
        Arc::clone(&active_connections),
        shutdown,
        drain_rx,
    )
    .await;

    logger::log_shutdown_started(active_connections.load(Ordering::SeqCst));
    drain_tx.send_replace(true);
    let grace = Duration::from_secs(cfg.performance.shutdown_timeout);
    let remaining = server::wait_for_drain(&active_connections, grace).await;
    logger::log_shutdown_complete(remaining);

    Ok(())
}

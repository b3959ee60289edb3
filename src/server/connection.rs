// Connection handling module
// Accepts a single TCP connection and serves it with the dispatcher

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::sync::watch;

use crate::config::Config;
use crate::handler::Dispatcher;
use crate::logger;

/// Per-connection limits, resolved from configuration once
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub keep_alive: bool,
    /// Time allowed for a client to send a complete request head
    pub header_read_timeout: Option<Duration>,
    pub max_connections: Option<u64>,
}

impl ConnectionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            keep_alive: config.performance.keep_alive_timeout > 0,
            header_read_timeout: Some(config.performance.read_timeout)
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            max_connections: config.performance.max_connections,
        }
    }
}

/// Accept and process a connection, checking limits and logging.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `dispatcher` - Shared request dispatcher
/// * `settings` - Keep-alive, header timeout and connection limit
/// * `conn_counter` - Active connection counter
/// * `drain` - Flips to `true` once shutdown starts
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    dispatcher: &Arc<Dispatcher>,
    settings: ConnectionSettings,
    conn_counter: &Arc<AtomicUsize>,
    drain: &watch::Receiver<bool>,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = settings.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_connection_accepted(&peer_addr);

    handle_connection(
        stream,
        peer_addr,
        Arc::clone(dispatcher),
        settings,
        Arc::clone(conn_counter),
        drain.clone(),
    );
}

/// Serve a connection in its own task.
///
/// When `drain` flips, the connection finishes the request in flight and then
/// closes instead of waiting for the next one. The counter is decremented when
/// the connection ends, whether it closed normally or failed.
fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    settings: ConnectionSettings,
    conn_counter: Arc<AtomicUsize>,
    mut drain: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);

        let mut builder = http1::Builder::new();
        builder.timer(TokioTimer::new()).keep_alive(settings.keep_alive);
        if let Some(timeout) = settings.header_read_timeout {
            builder.header_read_timeout(timeout);
        }

        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                let dispatcher = Arc::clone(&dispatcher);
                async move { Ok::<_, Infallible>(dispatcher.handle(req, peer_addr).await) }
            }),
        );
        tokio::pin!(conn);

        let mut draining = *drain.borrow_and_update();
        if draining {
            conn.as_mut().graceful_shutdown();
        }

        loop {
            tokio::select! {
                result = conn.as_mut() => {
                    if let Err(err) = result {
                        logger::log_connection_error(&err);
                    }
                    break;
                }
                changed = drain.changed(), if !draining => {
                    // A dropped sender also means the server is going away
                    if changed.is_err() || *drain.borrow() {
                        logger::log_debug(&format!("Draining connection from {peer_addr}"));
                        conn.as_mut().graceful_shutdown();
                        draining = true;
                    }
                }
            }
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let cfg = Config::from_toml("[performance]\nread_timeout = 4\nmax_connections = 8\n");
        let settings = ConnectionSettings::from_config(&cfg);
        assert!(settings.keep_alive);
        assert_eq!(settings.header_read_timeout, Some(Duration::from_secs(4)));
        assert_eq!(settings.max_connections, Some(8));
    }

    #[test]
    fn test_zero_read_timeout_disables_header_deadline() {
        let cfg = Config::from_toml("[performance]\nread_timeout = 0\nkeep_alive_timeout = 0\n");
        let settings = ConnectionSettings::from_config(&cfg);
        assert!(!settings.keep_alive);
        assert_eq!(settings.header_read_timeout, None);
    }
}

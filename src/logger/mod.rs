//! Logger module
//!
//! Provides logging utilities for the server:
//! - Startup banner and shutdown progress
//! - Per-request access logging in several formats
//! - Error, warning and debug lines
//! - File-based logging support

mod format;
pub mod writer;

pub use format::{AccessLogEntry, AccessLogFormat};
pub use writer::LogLevel;

use crate::config::Config;
use std::net::SocketAddr;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(
        LogLevel::from_name(&config.logging.level),
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

fn write(level: LogLevel, message: &str) {
    if let Some(w) = writer::get() {
        w.write(level, message);
    } else if level <= LogLevel::Warn {
        eprintln!("{message}");
    } else {
        println!("{message}");
    }
}

fn write_info(message: &str) {
    write(LogLevel::Info, message);
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    let max_delay = config.delay.max_seconds();
    write_info("======================================");
    write_info("Delay API server started successfully");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!(
        "Profile: {} (max delay {max_delay}s)",
        config.delay.profile
    ));
    write_info(&format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("Available endpoints:");
    write_info(&format!("  GET  http://{addr}/                 - health check"));
    write_info(&format!("  POST http://{addr}/date             - current date"));
    write_info(&format!(
        "  GET  http://{addr}/delay?time=N     - delay N seconds (0..={max_delay})"
    ));
    write_info(&format!("  POST http://{addr}/delay {{\"time\":N}} - same, JSON body"));
    write_info("======================================\n");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write(
        LogLevel::Debug,
        &format!("[Connection] Accepted from: {peer_addr}"),
    );
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write(
        LogLevel::Error,
        &format!("[ERROR] Failed to serve connection: {err:?}"),
    );
}

pub fn log_error(message: &str) {
    write(LogLevel::Error, &format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write(LogLevel::Warn, &format!("[WARN] {message}"));
}

pub fn log_debug(message: &str) {
    write(LogLevel::Debug, &format!("[DEBUG] {message}"));
}

pub fn log_signal(name: &str) {
    write_info(&format!(
        "\n[SIGNAL] {name} received, initiating graceful shutdown"
    ));
}

pub fn log_shutdown_started(active: usize) {
    write_info(&format!(
        "\n[Shutdown] Stopped accepting connections, {active} still active"
    ));
}

pub fn log_shutdown_complete(remaining: usize) {
    if remaining == 0 {
        write_info("[Shutdown] All connections closed, exiting");
    } else {
        log_warning(&format!(
            "[Shutdown] Grace period elapsed with {remaining} connection(s) still open"
        ));
    }
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: AccessLogFormat) {
    let line = entry.format(format);
    if let Some(w) = writer::get() {
        w.write_access(&line);
    } else {
        println!("{line}");
    }
}

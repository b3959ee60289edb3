// Server module entry
// Listener setup, connection serving, signal handling and graceful shutdown

pub mod connection;
pub mod listener;
pub mod shutdown;
pub mod signal;

// `loop` is a keyword, so the file is mounted under another name
#[path = "loop.rs"]
pub mod server_loop;

pub use connection::ConnectionSettings;
pub use listener::create_listener;
pub use server_loop::start_server_loop;
pub use shutdown::wait_for_drain;
pub use signal::start_signal_handler;

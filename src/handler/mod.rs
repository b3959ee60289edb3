//! Request handler module
//!
//! Request routing dispatch and the three endpoints: health, date and delay.

pub mod date;
pub mod delay;
pub mod error;
pub mod health;
pub mod router;

// Re-export main entry point
pub use router::Dispatcher;

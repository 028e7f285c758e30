//! Library crate for scan-watch: consumes a pushed stream of device scan
//! results, keeps a session-durable history of them and shows both.
pub mod clock;
pub mod config;
pub mod decoder;
pub mod display;
pub mod error;
pub mod history;
pub mod indicator;
pub mod render;
pub mod server;
pub mod session;
pub mod sse;
pub mod store;
pub mod transport;
pub mod types;
pub mod wakelock;

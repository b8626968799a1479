// ukurair-api: Async Rust clients for the UKURAIR water-level backends
// (REST JSON API and hosted realtime database)

pub mod error;
pub mod realtime;
pub mod rest;
pub mod transport;
mod wire;

pub use error::Error;
pub use realtime::{RealtimeClient, RealtimeConfig, ReconnectConfig, StreamEvent};
pub use rest::{RestClient, RestLogin};
pub use transport::{TlsMode, TransportConfig};
pub use wire::{parse_timestamp, timestamp_from_value};

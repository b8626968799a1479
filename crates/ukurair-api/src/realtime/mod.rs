// Realtime database client
//
// REST surface of the hosted database plus its identity provider:
// one-shot reads, multi-path writes and server-sent event subscriptions.

mod auth;
mod client;
mod devices;
pub mod models;
mod stream;

pub use client::{RealtimeClient, RealtimeConfig};
pub use stream::{ReconnectConfig, StreamEvent};

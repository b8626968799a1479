// REST API client
//
// Bearer-token JSON API. Endpoint groups are implemented as inherent
// methods on `RestClient` across the sibling modules.

mod admin;
mod auth;
mod client;
mod devices;
pub mod models;

pub use auth::RestLogin;
pub use client::RestClient;

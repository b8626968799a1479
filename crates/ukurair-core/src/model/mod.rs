// ── Domain model ──
//
// Canonical types shared by both backend bindings. Wire shapes live in
// `ukurair-api`; `crate::convert` maps them here.

mod admin;
mod device;
mod session;
mod view;

pub use admin::{AdminStats, Settings, StatusCount};
pub use device::{DashboardEntry, Device, DeviceId, Measurement, WaterStatus};
pub use session::{BackendKind, Credentials, Session, UserProfile};
pub use view::{Screen, ViewState};

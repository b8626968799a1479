// ── View state ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use super::DeviceId;

/// Top-level screens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum Screen {
    #[default]
    Dashboard,
    Login,
    DeviceDetail,
    Admin,
}

/// What the user is looking at. Owned by the `Controller`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub screen: Screen,
    /// Set only on `DeviceDetail`.
    pub selected: Option<DeviceId>,
    pub error: Option<String>,
    pub loading: bool,
}

impl ViewState {
    pub fn on(screen: Screen) -> Self {
        Self {
            screen,
            ..Self::default()
        }
    }
}

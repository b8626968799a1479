//! Data bridge: connects [`Controller`] state to TUI actions.
//!
//! Runs as a background task: starts the controller, subscribes to the
//! view state and every store slice, and forwards each change as an
//! [`Action`] through the TUI's action channel.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ukurair_core::Controller;

use crate::action::{Action, Notification};

fn session_name(controller: &Controller) -> Option<String> {
    controller
        .session()
        .map(|s| s.user.display_name().to_owned())
}

/// Forward controller state into the action loop until cancelled, then
/// shut the controller down.
pub async fn spawn_data_bridge(
    controller: Controller,
    action_tx: mpsc::UnboundedSender<Action>,
    cancel: CancellationToken,
) {
    if let Err(e) = controller.start().await {
        warn!(error = %e, "controller failed to start");
        let _ = action_tx.send(Action::Notify(Notification::error(e.user_message())));
    }

    let store = controller.store().clone();
    let mut view = controller.subscribe_view();
    let mut dashboard = store.subscribe_dashboard();
    let mut devices = store.subscribe_devices();
    let mut settings = store.subscribe_settings();
    let mut stats = store.subscribe_stats();
    let mut histories = store.subscribe_histories();

    // Initial snapshots so screens have data immediately
    let _ = action_tx.send(Action::ViewChanged(view.borrow_and_update().clone()));
    let _ = action_tx.send(Action::SessionChanged(session_name(&controller)));
    let _ = action_tx.send(Action::DashboardUpdated(dashboard.current().clone()));
    let _ = action_tx.send(Action::DevicesUpdated(devices.current().clone()));
    let _ = action_tx.send(Action::SettingsUpdated(settings.current().clone()));
    let _ = action_tx.send(Action::StatsUpdated(stats.current().clone()));
    let _ = action_tx.send(Action::HistoriesUpdated(histories.current().clone()));

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            Ok(()) = view.changed() => {
                let state = view.borrow_and_update().clone();
                debug!(screen = %state.screen, "dispatching ViewChanged");
                // Every navigation may follow a login or logout.
                let _ = action_tx.send(Action::SessionChanged(session_name(&controller)));
                let _ = action_tx.send(Action::ViewChanged(state));
            }
            Some(d) = dashboard.changed() => {
                let _ = action_tx.send(Action::DashboardUpdated(d));
                let _ = action_tx.send(Action::LastUpdate(store.last_update()));
            }
            Some(d) = devices.changed() => {
                let _ = action_tx.send(Action::DevicesUpdated(d));
            }
            Some(s) = settings.changed() => {
                let _ = action_tx.send(Action::SettingsUpdated(s));
            }
            Some(s) = stats.changed() => {
                let _ = action_tx.send(Action::StatsUpdated(s));
            }
            Some(h) = histories.changed() => {
                let _ = action_tx.send(Action::HistoriesUpdated(h));
            }
        }
    }

    controller.shutdown().await;
    debug!("data bridge shut down");
}

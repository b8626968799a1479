//! Terminal input pump.
//!
//! A background task merges crossterm input with two timers: `Tick` drives
//! throbbers and toast expiry, `Render` paces redraws. Pasted text arrives
//! as one `Paste` event so a token or API key lands in a field intact.

use std::time::Duration;

use crossterm::event::{Event as TermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
pub enum Event {
    Key(KeyEvent),
    /// Bracketed paste, one event per paste.
    Paste(String),
    Resize(u16, u16),
    Tick,
    Render,
}

/// Timer rates for the pump.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    pub tick: Duration,
    pub render: Duration,
}

impl Default for Cadence {
    /// 4 Hz ticks, ~30 FPS redraws.
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(250),
            render: Duration::from_millis(33),
        }
    }
}

fn timer(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Only presses, pastes and resizes reach the app.
fn translate(event: TermEvent) -> Option<Event> {
    match event {
        TermEvent::Key(key) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
        TermEvent::Paste(text) => Some(Event::Paste(text)),
        TermEvent::Resize(cols, rows) => Some(Event::Resize(cols, rows)),
        _ => None,
    }
}

pub struct EventReader {
    rx: mpsc::UnboundedReceiver<Event>,
    cancel: CancellationToken,
}

impl EventReader {
    pub fn spawn(cadence: Cadence) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let stop = cancel.clone();

        tokio::spawn(async move {
            let mut input = EventStream::new();
            let mut tick = timer(cadence.tick);
            let mut render = timer(cadence.render);

            loop {
                let next = tokio::select! {
                    () = stop.cancelled() => break,
                    _ = tick.tick() => Some(Event::Tick),
                    _ = render.tick() => Some(Event::Render),
                    read = input.next() => match read {
                        Some(Ok(event)) => translate(event),
                        Some(Err(e)) => {
                            debug!(error = %e, "terminal read failed");
                            None
                        }
                        // stdin closed
                        None => break,
                    },
                };

                if let Some(event) = next {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        Self { rx, cancel }
    }

    /// `None` once the pump has stopped.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for EventReader {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

//! Presentation collaborator.
//!
//! The controller never renders anything itself. Everything a user interface
//! needs is handed to a [`Presenter`] as a [`PresentationEvent`].

use tokio::sync::broadcast;

use crate::ble::DiscoveredDevice;
use crate::data::ClockSyncResult;
use crate::lifecycle::ConnectionState;

/// Something the user interface should show.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationEvent {
    /// A named device was found while scanning.
    DeviceFound {
        /// The device.
        device: DiscoveredDevice,
        /// Whether it advertises the configured feeder name.
        is_feeder: bool,
    },
    /// Connection progress text.
    Status(String),
    /// The lifecycle moved to a new state.
    StateChanged(ConnectionState),
    /// An alarm report arrived.
    AlarmUpdated {
        /// Alarm slot.
        index: u8,
        /// Zero-padded `HH:MM`.
        time: String,
        /// Whether the alarm is armed.
        enabled: bool,
    },
    /// A clock report was compared with host time. `Display` gives the text.
    ClockSynced(ClockSyncResult),
    /// Raw text of an incoming line.
    MessageReceived(String),
    /// The connection was torn down because of an error.
    Error(String),
}

/// Receives presentation events.
pub trait Presenter: Send + Sync {
    /// Handle one event.
    fn present(&self, event: PresentationEvent);
}

impl<F> Presenter for F
where
    F: Fn(PresentationEvent) + Send + Sync,
{
    fn present(&self, event: PresentationEvent) {
        self(event)
    }
}

/// Presenter that broadcasts events to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventPresenter {
    event_tx: broadcast::Sender<PresentationEvent>,
}

impl EventPresenter {
    /// Create a presenter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        Self { event_tx }
    }

    /// Subscribe to presentation events.
    pub fn subscribe(&self) -> broadcast::Receiver<PresentationEvent> {
        self.event_tx.subscribe()
    }
}

impl Presenter for EventPresenter {
    fn present(&self, event: PresentationEvent) {
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_event_presenter_fans_out() {
        let presenter = EventPresenter::new(8);
        let mut a = presenter.subscribe();
        let mut b = presenter.subscribe();

        presenter.present(PresentationEvent::Status("Scanning...".into()));

        assert_eq!(
            a.try_recv().unwrap(),
            PresentationEvent::Status("Scanning...".into())
        );
        assert_eq!(
            b.try_recv().unwrap(),
            PresentationEvent::Status("Scanning...".into())
        );
    }

    #[test]
    fn test_present_without_subscribers_is_dropped() {
        let presenter = EventPresenter::new(1);
        presenter.present(PresentationEvent::Error("Disconnected".into()));
    }

    #[test]
    fn test_closure_presenter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let presenter = move |event: PresentationEvent| sink.lock().unwrap().push(event);

        presenter.present(PresentationEvent::StateChanged(ConnectionState::Idle));

        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}

//! Single-task controller for the feeder.
//!
//! [`FeederController`] owns the [`ConnectionStateMachine`] inside one tokio
//! task and feeds it both user intents and transport events, one at a time.
//! Callers talk to it through the cloneable [`FeederHandle`].

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::ble::transport::{Transport, TransportEvent};
use crate::error::{Error, Result};
use crate::lifecycle::ConnectionStateMachine;
use crate::presenter::Presenter;
use crate::protocol::Command;

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Start a fresh scan.
    StartScan,
    /// Connect to a device found by the current scan.
    Connect(String),
    /// Disconnect without reporting an error.
    Disconnect,
    /// Send a command.
    Send(Command),
    /// Push the host clock to the feeder.
    PushTime,
}

enum Message {
    Intent(Intent),
    Shutdown,
}

/// Runs the state machine on its own task.
pub struct FeederController<T: Transport, P: Presenter> {
    machine: ConnectionStateMachine<T, P>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    messages: mpsc::UnboundedReceiver<Message>,
}

impl<T, P> FeederController<T, P>
where
    T: Transport + 'static,
    P: Presenter + 'static,
{
    /// Spawn the controller task.
    ///
    /// `events` is the receiving half of the transport's event channel.
    pub fn spawn(
        machine: ConnectionStateMachine<T, P>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> FeederHandle {
        let (message_tx, messages) = mpsc::unbounded_channel();

        let controller = Self {
            machine,
            events,
            messages,
        };

        let task = tokio::spawn(controller.run());

        FeederHandle {
            message_tx,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    async fn run(mut self) {
        info!("Feeder controller started");

        'run: loop {
            tokio::select! {
                message = self.messages.recv() => {
                    let messages = match message.unwrap_or(Message::Shutdown) {
                        Message::Intent(Intent::Connect(address)) => self.connect(address).await,
                        other => vec![other],
                    };

                    for message in messages {
                        match message {
                            Message::Intent(intent) => self.handle_intent(intent).await,
                            Message::Shutdown => break 'run,
                        }
                    }
                }
                Some(event) = self.events.recv() => self.handle_event(event).await,
            }
        }

        self.machine.disconnect().await;
        info!("Feeder controller stopped");
    }

    /// Run a connect attempt while still listening for intents.
    ///
    /// `Disconnect`, `StartScan` and `Shutdown` abandon the attempt wherever it
    /// is parked; other intents wait for it to settle. Returns the messages
    /// received in the meantime, in order.
    async fn connect(&mut self, address: String) -> Vec<Message> {
        let mut received = Vec::new();

        let connect = self.machine.connect(&address);
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    log_outcome(result);
                    return received;
                }
                message = self.messages.recv() => {
                    let message = message.unwrap_or(Message::Shutdown);
                    let abandons = matches!(
                        message,
                        Message::Shutdown
                            | Message::Intent(Intent::Disconnect | Intent::StartScan)
                    );
                    received.push(message);

                    if abandons {
                        info!("Abandoning connection attempt to {}", address);
                        return received;
                    }
                }
            }
        }
    }

    async fn handle_intent(&mut self, intent: Intent) {
        debug!("Intent: {:?}", intent);

        let result = match intent {
            Intent::StartScan => self.machine.start_scan().await,
            Intent::Connect(address) => self.machine.connect(&address).await,
            Intent::Disconnect => {
                self.machine.disconnect().await;
                Ok(())
            }
            Intent::Send(command) => self.machine.send(&command).await,
            Intent::PushTime => self.machine.push_time().await,
        };

        log_outcome(result);
    }

    async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::DeviceFound(device) => self.machine.on_device_found(device),
            TransportEvent::ScanFailed(reason) => self.machine.on_scan_failed(reason).await,
            TransportEvent::Notification(payload) => {
                log_outcome(self.machine.on_notification(&payload).await)
            }
        }
    }
}

/// Errors that tore the connection down were already surfaced; anything else
/// was a rejected request.
fn log_outcome(result: Result<()>) {
    match result {
        Ok(()) => {}
        Err(
            e @ (Error::DeviceNotFound { .. }
            | Error::InvalidTransition { .. }
            | Error::InvalidParameter { .. }),
        ) => warn!("Request rejected: {}", e),
        Err(e) => debug!("Request failed: {}", e),
    }
}

/// Handle for sending intents to a running [`FeederController`].
#[derive(Clone)]
pub struct FeederHandle {
    message_tx: mpsc::UnboundedSender<Message>,
    task: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl FeederHandle {
    fn intent(&self, intent: Intent) -> Result<()> {
        self.message_tx
            .send(Message::Intent(intent))
            .map_err(|_| Error::ControllerStopped)
    }

    /// Start a fresh scan.
    pub fn start_scan(&self) -> Result<()> {
        self.intent(Intent::StartScan)
    }

    /// Connect to a device found by the current scan.
    pub fn connect(&self, address: impl Into<String>) -> Result<()> {
        self.intent(Intent::Connect(address.into()))
    }

    /// Disconnect without reporting an error.
    pub fn disconnect(&self) -> Result<()> {
        self.intent(Intent::Disconnect)
    }

    /// Send a command.
    pub fn send(&self, command: Command) -> Result<()> {
        self.intent(Intent::Send(command))
    }

    /// Push the host clock to the feeder.
    pub fn push_time(&self) -> Result<()> {
        self.intent(Intent::PushTime)
    }

    /// Whether the controller task is still running.
    pub fn is_running(&self) -> bool {
        !self.message_tx.is_closed()
    }

    /// Disconnect and stop the controller task.
    pub async fn shutdown(&self) -> Result<()> {
        let _ = self.message_tx.send(Message::Shutdown);

        let task = self.task.lock().take();
        if let Some(task) = task {
            task.await
                .map_err(|e| Error::Internal(format!("controller task failed: {}", e)))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::transport::DiscoveredDevice;
    use crate::config::FeederConfig;
    use crate::data::AlarmSetting;
    use crate::lifecycle::tests::*;
    use crate::lifecycle::ConnectionState;
    use crate::presenter::{EventPresenter, PresentationEvent};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::sync::broadcast;
    use tokio_test::assert_ok;
    use uuid::Uuid;

    async fn wait_for<F>(events: &mut broadcast::Receiver<PresentationEvent>, mut predicate: F)
    where
        F: FnMut(&PresentationEvent) -> bool,
    {
        let found = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match events.recv().await {
                    Ok(event) if predicate(&event) => return,
                    Ok(_) => {}
                    Err(e) => panic!("event channel failed: {}", e),
                }
            }
        })
        .await;
        assert!(found.is_ok(), "timed out waiting for event");
    }

    #[tokio::test]
    async fn test_full_session() {
        let mut transport = permissive_transport();
        let writes = record_writes(&mut transport);
        let (machine, mut events) = machine(transport);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let handle = FeederController::spawn(machine, event_rx);

        assert_ok!(handle.start_scan());
        wait_for(&mut events, |e| {
            *e == PresentationEvent::StateChanged(ConnectionState::Scanning)
        })
        .await;

        event_tx
            .send(TransportEvent::DeviceFound(DiscoveredDevice::new(
                ADDRESS,
                Some("HungryCat".into()),
                Some(-55),
            )))
            .unwrap();
        wait_for(&mut events, |e| {
            matches!(e, PresentationEvent::DeviceFound { is_feeder: true, .. })
        })
        .await;

        assert_ok!(handle.connect(ADDRESS));
        wait_for(&mut events, |e| {
            *e == PresentationEvent::StateChanged(ConnectionState::Ready)
        })
        .await;

        event_tx
            .send(TransportEvent::Notification(Bytes::from_static(b"alarm 2 18:30 1")))
            .unwrap();
        wait_for(&mut events, |e| {
            *e == PresentationEvent::AlarmUpdated {
                index: 2,
                time: "18:30".into(),
                enabled: true,
            }
        })
        .await;

        let alarm = AlarmSetting::new(2, 19, 0, false).unwrap();
        assert_ok!(handle.send(Command::Alarm(alarm)));
        assert_ok!(handle.shutdown().await);
        assert!(!handle.is_running());

        assert_eq!(*writes.lock().unwrap(), vec!["list", "2 19:00 0"]);
    }

    #[tokio::test]
    async fn test_scan_failure_event_surfaces_error() {
        let (machine, mut events) = machine(permissive_transport());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let handle = FeederController::spawn(machine, event_rx);

        assert_ok!(handle.start_scan());
        event_tx
            .send(TransportEvent::ScanFailed("adapter reset".into()))
            .unwrap();

        wait_for(&mut events, |e| {
            *e == PresentationEvent::Error("Failed to scan for devices.".into())
        })
        .await;

        assert_ok!(handle.shutdown().await);
    }

    /// Transport whose `connect` never completes.
    #[derive(Default)]
    struct StalledTransport {
        closed: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for StalledTransport {
        async fn start_scan(&self) -> Result<()> {
            Ok(())
        }

        async fn stop_scan(&self) -> Result<()> {
            Ok(())
        }

        async fn connect(&self, _address: &str) -> Result<()> {
            std::future::pending().await
        }

        async fn close(&self, address: &str) -> Result<()> {
            self.closed.lock().push(address.to_string());
            Ok(())
        }

        async fn discover_services(&self, _address: &str, _services: &[Uuid]) -> Result<()> {
            Ok(())
        }

        async fn write_characteristic(
            &self,
            _address: &str,
            _characteristic: Uuid,
            _data: &[u8],
        ) -> Result<()> {
            Ok(())
        }

        async fn write_descriptor(
            &self,
            _address: &str,
            _characteristic: Uuid,
            _descriptor: Uuid,
            _data: &[u8],
        ) -> Result<()> {
            Ok(())
        }

        async fn enable_notification(&self, _address: &str, _characteristic: Uuid) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stalled_connect_can_be_abandoned() {
        let transport = StalledTransport::default();
        let closed = transport.closed.clone();
        let presenter = EventPresenter::new(64);
        let mut events = presenter.subscribe();
        let machine = ConnectionStateMachine::new(transport, presenter, FeederConfig::default());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let handle = FeederController::spawn(machine, event_rx);

        assert_ok!(handle.start_scan());
        event_tx
            .send(TransportEvent::DeviceFound(DiscoveredDevice::new(
                ADDRESS,
                Some("HungryCat".into()),
                None,
            )))
            .unwrap();
        wait_for(&mut events, |e| matches!(e, PresentationEvent::DeviceFound { .. })).await;

        assert_ok!(handle.connect(ADDRESS));
        wait_for(&mut events, |e| {
            *e == PresentationEvent::StateChanged(ConnectionState::Connecting)
        })
        .await;

        assert_ok!(handle.disconnect());
        wait_for(&mut events, |e| {
            *e == PresentationEvent::StateChanged(ConnectionState::Idle)
        })
        .await;
        assert_eq!(*closed.lock(), vec![ADDRESS.to_string()]);

        assert_ok!(handle.start_scan());
        wait_for(&mut events, |e| {
            *e == PresentationEvent::StateChanged(ConnectionState::Scanning)
        })
        .await;

        let stopped = tokio::time::timeout(Duration::from_secs(1), handle.shutdown()).await;
        assert!(matches!(stopped, Ok(Ok(()))));
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_abandons_stalled_connect() {
        let presenter = EventPresenter::new(64);
        let mut events = presenter.subscribe();
        let machine =
            ConnectionStateMachine::new(StalledTransport::default(), presenter, FeederConfig::default());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let handle = FeederController::spawn(machine, event_rx);

        assert_ok!(handle.start_scan());
        event_tx
            .send(TransportEvent::DeviceFound(DiscoveredDevice::new(
                ADDRESS,
                Some("HungryCat".into()),
                None,
            )))
            .unwrap();
        wait_for(&mut events, |e| matches!(e, PresentationEvent::DeviceFound { .. })).await;
        assert_ok!(handle.connect(ADDRESS));
        wait_for(&mut events, |e| {
            *e == PresentationEvent::StateChanged(ConnectionState::Connecting)
        })
        .await;

        let stopped = tokio::time::timeout(Duration::from_secs(1), handle.shutdown()).await;
        assert!(matches!(stopped, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_intent_after_shutdown_fails() {
        let (machine, _events) = machine(permissive_transport());
        let (_event_tx, event_rx) = mpsc::unbounded_channel();
        let handle = FeederController::spawn(machine, event_rx);

        assert_ok!(handle.shutdown().await);

        assert!(matches!(handle.start_scan(), Err(Error::ControllerStopped)));
    }
}

//! Single-writer dispatcher (§5): every external signal arrives as a
//! message on one `tokio::sync::mpsc` channel, and this loop is the only
//! place that ever touches the grabber/pipeline state. Timers are
//! `tokio::time::sleep`-scheduled messages fed back into the same channel
//! rather than inline blocking waits.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{error, warn};

use crate::config::CoreConfiguration;
use crate::device::{DeviceId, DeviceProperties};
use crate::error::CoreError;
use crate::external::{
    HidMonitorMessage, HidValueMonitor, NotificationMessageSink, PeerMessage, PowerManagementMessage, ProcessKiller,
};
use crate::grabber::DeviceGrabber;
use crate::time::AbsoluteTime;
use crate::virtual_hid::VirtualHidServiceClient;

/// Everything that can arrive at the dispatcher (§5: "external signals ...
/// are enqueued onto the dispatcher; they never mutate state inline").
pub enum Message {
    Hid(HidMonitorMessage),
    Power(PowerManagementMessage),
    Peer(PeerMessage),
    ConfigurationChanged(CoreConfiguration),
    VirtualHidConnected,
    VirtualHidDisconnected,
    /// Fired by a scheduled wakeup to drive a pending manipulator timer or
    /// queued entry; carries no payload, the dispatcher re-reads current
    /// time itself.
    Tick,
}

/// Converts a `std::time::Instant`-free monotonic nanosecond count into the
/// pipeline's `AbsoluteTime`. The dispatcher is the one place allowed to
/// read the wall clock, via `tokio::time::Instant`, translating to the
/// pipeline's own nanosecond epoch relative to dispatcher start.
fn now_relative_to(start: Instant) -> AbsoluteTime {
    AbsoluteTime(Instant::now().saturating_duration_since(start).as_nanos() as u64)
}

/// Owns the grabber and the injected external collaborators, and drains the
/// message channel until it closes or a fatal error requests shutdown.
pub struct Dispatcher {
    grabber: DeviceGrabber,
    virtual_hid_client: Box<dyn VirtualHidServiceClient>,
    notification_sink: Box<dyn NotificationMessageSink>,
    process_killer: Box<dyn ProcessKiller>,
    receiver: mpsc::UnboundedReceiver<Message>,
    sender: mpsc::UnboundedSender<Message>,
    start: Instant,
    /// Maps the HID monitor's own registry identifier to the `DeviceId`
    /// this crate minted for it, since `DeviceMatched`/`DeviceTerminated`
    /// correlate on the former.
    registry_to_device: HashMap<u64, DeviceId>,
}

impl Dispatcher {
    pub fn new(
        configuration: CoreConfiguration,
        virtual_hid_client: Box<dyn VirtualHidServiceClient>,
        notification_sink: Box<dyn NotificationMessageSink>,
        process_killer: Box<dyn ProcessKiller>,
    ) -> (Self, mpsc::UnboundedSender<Message>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let dispatcher = Self {
            grabber: DeviceGrabber::new(configuration),
            virtual_hid_client,
            notification_sink,
            process_killer,
            receiver,
            sender: sender.clone(),
            start: Instant::now(),
            registry_to_device: HashMap::new(),
        };
        (dispatcher, sender)
    }

    fn now(&self) -> AbsoluteTime {
        now_relative_to(self.start)
    }

    /// Runs until the channel closes. Schedules a `Tick` for the earliest
    /// pending manipulator wakeup or queued entry after every message,
    /// mirroring `tokio::time::sleep`-scheduled timers (§5).
    pub async fn run(mut self) {
        loop {
            let next_wakeup = self.grabber.min_input_event_time_stamp();
            let sleep_duration = next_wakeup.map(|wakeup| {
                let now = self.now();
                if wakeup.0 > now.0 {
                    Duration::from_nanos(wakeup.0 - now.0)
                } else {
                    Duration::from_nanos(0)
                }
            });

            let message = match sleep_duration {
                Some(duration) => {
                    tokio::select! {
                        msg = self.receiver.recv() => msg,
                        _ = tokio::time::sleep(duration) => Some(Message::Tick),
                    }
                }
                None => self.receiver.recv().await,
            };

            let Some(message) = message else {
                break;
            };

            self.handle(message);

            let now = self.now();
            self.grabber.manipulate(self.virtual_hid_client.as_mut(), now);
        }
    }

    fn handle(&mut self, message: Message) {
        let now = self.now();

        match message {
            Message::Hid(hid) => self.handle_hid(hid, now),
            Message::Power(power) => self.handle_power(power, now),
            Message::Peer(peer) => self.handle_peer(peer),
            Message::ConfigurationChanged(configuration) => {
                self.grabber.update_configuration(configuration, self.notification_sink.as_mut(), now);
            }
            Message::VirtualHidConnected => {
                self.grabber.virtual_hid_connected(self.virtual_hid_client.as_mut(), self.notification_sink.as_mut(), now);
            }
            Message::VirtualHidDisconnected => {
                self.grabber.virtual_hid_disconnected(self.notification_sink.as_mut(), now);
            }
            Message::Tick => {}
        }
    }

    fn handle_hid(&mut self, message: HidMonitorMessage, now: AbsoluteTime) {
        match message {
            HidMonitorMessage::DeviceMatched { registry_id, properties } => {
                let monitor: Box<dyn HidValueMonitor> = Box::new(NullHidValueMonitor);
                let device_id =
                    self.grabber.device_matched(properties, monitor, self.notification_sink.as_mut(), now);
                self.registry_to_device.insert(registry_id, device_id);
            }
            HidMonitorMessage::DeviceTerminated { registry_id } => {
                if let Some(device_id) = self.registry_to_device.remove(&registry_id) {
                    self.grabber.device_terminated(device_id, self.notification_sink.as_mut(), now);
                }
            }
            HidMonitorMessage::DeviceError { registry_id, message, not_permitted } => {
                let device_id = self.registry_to_device.get(&registry_id).copied();
                if not_permitted {
                    error!(?device_id, %message, "device not permitted, terminating");
                    self.process_killer.terminate(1);
                } else {
                    warn!(?device_id, %message, "transient HID error");
                }
            }
            HidMonitorMessage::ValuesArrived { device_id, time_stamp, values } => {
                self.grabber.values_arrived(device_id, time_stamp, &values, self.notification_sink.as_mut(), now);
            }
            HidMonitorMessage::DeviceStarted { .. } | HidMonitorMessage::DeviceStopped { .. } => {}
        }
    }

    fn handle_power(&mut self, message: PowerManagementMessage, now: AbsoluteTime) {
        match message {
            PowerManagementMessage::SystemWillSleep { completion_token } => {
                self.grabber.system_will_sleep(self.notification_sink.as_mut(), now);
                // Must acknowledge within a bounded delay; this crate has no
                // PowerManagementMonitor wired in by default here, so the
                // binary that injects one is responsible for the ack call.
                let _ = completion_token;
            }
            PowerManagementMessage::CanSystemSleep { .. } => {}
            PowerManagementMessage::SystemWillPowerOn
            | PowerManagementMessage::SystemHasPoweredOn
            | PowerManagementMessage::SystemWillNotSleep => {
                self.grabber.system_did_wake(self.notification_sink.as_mut(), now);
            }
        }
    }

    fn handle_peer(&mut self, message: PeerMessage) {
        let now = self.now();
        match message {
            PeerMessage::ObservedDeviceUpdated { device_id, properties } => {
                self.grabber.update_observed_device_properties(device_id, properties);
            }
            PeerMessage::ObservedKeyEvent { device_id, usage_pair, event_type } => {
                self.grabber.observe_key_event(device_id, usage_pair, event_type, self.notification_sink.as_mut(), now);
            }
            PeerMessage::ObservedCapsLockStateChanged { .. }
            | PeerMessage::SystemPreferencesChanged
            | PeerMessage::FrontmostApplicationChanged { .. }
            | PeerMessage::InputSourceChanged { .. }
            | PeerMessage::SetVariable { .. } => {
                // These feed the manipulator environment cache via entries
                // pushed onto a queue (§3 "Queue"); wiring a peer-originated
                // entry into the merged input queue is the adapter's job,
                // not this core's, per the `PeerDatagramChannel` boundary.
            }
        }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<Message> {
        self.sender.clone()
    }
}

/// A `HidValueMonitor` that does nothing; used where the dispatcher needs
/// to hand a device entry a monitor handle before the real OS-specific
/// adapter has registered one (e.g. observed-only devices this process
/// never seizes).
#[derive(Debug, Default)]
struct NullHidValueMonitor;

impl HidValueMonitor for NullHidValueMonitor {
    fn async_start(&mut self, _seize: bool) {}
    fn async_stop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::testing::{RecordingNotificationSink, RecordingProcessKiller};
    use crate::virtual_hid::testing::RecordingVirtualHidClient;

    #[tokio::test]
    async fn dispatcher_processes_device_matched_then_shuts_down_on_channel_close() {
        let (dispatcher, sender) = Dispatcher::new(
            CoreConfiguration::default(),
            Box::new(RecordingVirtualHidClient::ready()),
            Box::new(RecordingNotificationSink::default()),
            Box::new(RecordingProcessKiller::default()),
        );

        let mut properties = DeviceProperties::new(DeviceId(0));
        properties.is_keyboard = Some(true);
        sender
            .send(Message::Hid(HidMonitorMessage::DeviceMatched { registry_id: 1, properties }))
            .unwrap();
        drop(sender);

        dispatcher.run().await;
    }
}

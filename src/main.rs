//! Binary entry point. Wires demo implementations of the external
//! collaborator traits (real OS-specific HID enumeration, the platform's
//! virtual HID driver, and configuration-file parsing are all out of
//! scope, per §1) into the dispatcher and runs it to completion.

use anyhow::Result;
use tracing::info;

use hidgrab_core::config::{ConfigurationProvider, CoreConfiguration, ManipulatorRule, StaticConfigurationProvider};
use hidgrab_core::device::DeviceId;
use hidgrab_core::dispatcher::{Dispatcher, Message};
use hidgrab_core::event::{Event, EventType, ModifierFlag, MomentarySwitchEvent, MouseKey, PointingMotion, UsagePair};
use hidgrab_core::external::{HidMonitorMessage, NotificationMessageSink, ProcessKiller};
use hidgrab_core::virtual_hid::{VirtualHidDevicesState, VirtualHidServiceClient};

/// Logs every post-processed event instead of talking to a real virtual
/// HID driver, which is out of scope for this crate (§1).
#[derive(Debug, Default)]
struct LoggingVirtualHidClient {
    state: VirtualHidDevicesState,
}

impl VirtualHidServiceClient for LoggingVirtualHidClient {
    fn state(&self) -> VirtualHidDevicesState {
        self.state
    }

    fn post_key(&mut self, usage_pair: UsagePair, event_type: EventType) {
        info!(?usage_pair, ?event_type, "post_key");
    }

    fn post_pointing_button(&mut self, usage_pair: UsagePair, event_type: EventType) {
        info!(?usage_pair, ?event_type, "post_pointing_button");
    }

    fn post_pointing_motion(&mut self, motion: PointingMotion) {
        info!(?motion, "post_pointing_motion");
    }

    fn post_mouse_key(&mut self, mouse_key: MouseKey) {
        info!(?mouse_key, "post_mouse_key");
    }

    fn set_caps_lock_led_state(&mut self, on: bool) {
        info!(on, "set_caps_lock_led_state");
    }

    fn initialize_virtual_hid_keyboard(&mut self, country_code: u8) {
        info!(country_code, "initialize_virtual_hid_keyboard");
        self.state.keyboard_ready = true;
        self.state.pointing_ready = true;
    }

    fn reset_virtual_hid_keyboard(&mut self) {
        info!("reset_virtual_hid_keyboard");
        self.state = VirtualHidDevicesState::default();
    }
}

/// Logs notification messages instead of surfacing them through a desktop
/// notification center (out of scope, §1).
#[derive(Debug, Default)]
struct LoggingNotificationSink;

impl NotificationMessageSink for LoggingNotificationSink {
    fn set_message(&mut self, device_id: DeviceId, message: &str) {
        if message.is_empty() {
            info!(?device_id, "notification cleared");
        } else {
            info!(?device_id, message, "notification set");
        }
    }
}

/// Exits the process on a fatal, unrecoverable failure (§7 *not-permitted*).
#[derive(Debug, Default)]
struct ExitingProcessKiller;

impl ProcessKiller for ExitingProcessKiller {
    fn terminate(&mut self, exit_code: i32) {
        std::process::exit(exit_code);
    }
}

fn demo_configuration() -> CoreConfiguration {
    // A minimal demo remap: caps lock -> left control, the most common
    // single-key remap this class of daemon ships as its "hello world".
    let caps_lock_to_left_control = ManipulatorRule {
        from: MomentarySwitchEvent::key(UsagePair::new(0x07, 0x39)),
        mandatory_modifiers: vec![],
        optional_modifiers: vec![ModifierFlag::LeftShift, ModifierFlag::LeftControl],
        to: vec![hidgrab_core::config::ToEventConfig {
            event: Event::MomentarySwitch(MomentarySwitchEvent::modifier(
                UsagePair::new(0x07, 0xe0),
                ModifierFlag::LeftControl,
            )),
            modifiers: vec![],
            lazy: false,
            repeat: true,
            halt: false,
        }],
        to_if_alone: vec![],
        to_if_held_down: vec![],
        to_delayed_action_invoked: vec![],
        to_delayed_action_canceled: vec![],
        conditions: Default::default(),
    };

    CoreConfiguration {
        simple_modifications: vec![caps_lock_to_left_control],
        virtual_hid_keyboard_country_code: 0,
        delay_milliseconds_before_open_device: 200,
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let provider = StaticConfigurationProvider::new(demo_configuration());

    let (dispatcher, sender) = Dispatcher::new(
        provider.current(),
        Box::new(LoggingVirtualHidClient::default()),
        Box::new(LoggingNotificationSink),
        Box::new(ExitingProcessKiller),
    );

    // A real deployment feeds `sender` from OS-specific HID enumeration,
    // the virtual HID service's connection callbacks, a power-management
    // monitor, a peer datagram channel, and a configuration-file watcher.
    // Here we seed one demo keyboard so the dispatcher has something to do.
    let mut properties = hidgrab_core::device::DeviceProperties::new(DeviceId::ZERO);
    properties.is_keyboard = Some(true);
    properties.product = Some("Demo Keyboard".to_string());
    sender.send(Message::Hid(HidMonitorMessage::DeviceMatched { registry_id: 1, properties })).ok();
    sender.send(Message::VirtualHidConnected).ok();
    drop(sender);

    dispatcher.run().await;

    Ok(())
}

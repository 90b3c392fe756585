//! Canonical event model (§3 "Event").

use serde::{Deserialize, Serialize};

use crate::device::DeviceProperties;

/// HID usage-page / usage pair identifying a key, pointing button, or
/// consumer control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsagePair {
    pub usage_page: u32,
    pub usage: u32,
}

impl UsagePair {
    pub fn new(usage_page: u32, usage: u32) -> Self {
        Self { usage_page, usage }
    }
}

/// A momentary switch: a key, pointing button, or consumer control, carrying
/// an optional modifier-flag identity (used by the queue's reordering rule
/// and the modifier flag manager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MomentarySwitchEvent {
    pub usage_pair: UsagePair,
    pub modifier_flag: Option<ModifierFlag>,
    pub is_pointing_button: bool,
}

impl ModifierFlag {
    /// All ten tracked modifier flags, in a fixed order used when scanning
    /// "is anything extra held" checks.
    pub const fn all() -> [ModifierFlag; 10] {
        [
            ModifierFlag::CapsLock,
            ModifierFlag::LeftControl,
            ModifierFlag::LeftShift,
            ModifierFlag::LeftOption,
            ModifierFlag::LeftCommand,
            ModifierFlag::RightControl,
            ModifierFlag::RightShift,
            ModifierFlag::RightOption,
            ModifierFlag::RightCommand,
            ModifierFlag::Fn,
        ]
    }

    /// The standard keyboard-page HID usage for this modifier, used when a
    /// manipulator needs to synthesize a momentary-switch event for it.
    pub fn usage_pair(&self) -> UsagePair {
        let usage = match self {
            ModifierFlag::LeftControl => 0xe0,
            ModifierFlag::LeftShift => 0xe1,
            ModifierFlag::LeftOption => 0xe2,
            ModifierFlag::LeftCommand => 0xe3,
            ModifierFlag::RightControl => 0xe4,
            ModifierFlag::RightShift => 0xe5,
            ModifierFlag::RightOption => 0xe6,
            ModifierFlag::RightCommand => 0xe7,
            ModifierFlag::CapsLock => 0x39,
            // Not a standard keyboard-page usage; vendor-defined page carries it.
            ModifierFlag::Fn => 0x0003,
        };
        let page = if *self == ModifierFlag::Fn { 0xff00 } else { 0x07 };
        UsagePair::new(page, usage)
    }
}

impl MomentarySwitchEvent {
    pub fn key(usage_pair: UsagePair) -> Self {
        Self {
            usage_pair,
            modifier_flag: None,
            is_pointing_button: false,
        }
    }

    pub fn modifier(usage_pair: UsagePair, flag: ModifierFlag) -> Self {
        Self {
            usage_pair,
            modifier_flag: Some(flag),
            is_pointing_button: false,
        }
    }

    pub fn pointing_button(usage_pair: UsagePair) -> Self {
        Self {
            usage_pair,
            modifier_flag: None,
            is_pointing_button: true,
        }
    }

    pub fn is_modifier(&self) -> bool {
        self.modifier_flag.is_some()
    }
}

/// The set of modifier flags the queue's modifier-flag manager tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModifierFlag {
    CapsLock,
    LeftControl,
    LeftShift,
    LeftOption,
    LeftCommand,
    RightControl,
    RightShift,
    RightOption,
    RightCommand,
    Fn,
}

/// Relative pointing motion for one report tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PointingMotion {
    pub x: i32,
    pub y: i32,
    pub vertical_wheel: i32,
    pub horizontal_wheel: i32,
}

impl PointingMotion {
    pub fn is_zero(&self) -> bool {
        *self == PointingMotion::default()
    }
}

/// One of the shell-command/select-input-source/mouse-key family of
/// command-like virtual events a manipulator may emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseKey {
    pub x: i32,
    pub y: i32,
    pub vertical_wheel: i32,
    pub horizontal_wheel: i32,
    pub speed_multiplier: i32,
}

/// `on` / `off` / `toggle`, as used by the sticky-modifier virtual event
/// (§4.5.4 of the expanded spec).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StickyModifierType {
    On,
    Off,
    Toggle,
}

/// Canonical tagged union over every event kind the pipeline understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    MomentarySwitch(MomentarySwitchEvent),
    PointingMotion(PointingMotion),
    CapsLockStateChanged(bool),
    StickyModifier(ModifierFlag, StickyModifierType),

    DeviceGrabbed(DeviceProperties),
    DeviceUngrabbed,
    DeviceKeysAndPointingButtonsAreReleased,

    SetVariable(String, i64),

    ShellCommand(String),
    SelectInputSource(Vec<String>),
    MouseKey(MouseKey),
    StopKeyboardRepeat,

    FrontmostApplicationChanged { bundle_identifier: String, file_path: String },
    InputSourceChanged { language: Option<String>, input_source_id: Option<String> },
    SystemPreferencesChanged,
    VirtualHidDevicesStateChanged { keyboard_ready: bool, pointing_ready: bool },
    VirtualHidKeyboardCountryCodeChanged(u8),
}

impl Event {
    pub fn as_momentary_switch(&self) -> Option<&MomentarySwitchEvent> {
        match self {
            Event::MomentarySwitch(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_momentary_switch(&self) -> bool {
        matches!(self, Event::MomentarySwitch(_))
    }
}

/// `key_down` / `key_up` / `single`, as in §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    KeyDown,
    KeyUp,
    Single,
}

/// `original` (from hardware) / `virtual_event` (synthesized).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventState {
    Original,
    VirtualEvent,
}

/// Whether an entry is still eligible for further manipulation/emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Validity {
    Valid,
    Invalid,
}

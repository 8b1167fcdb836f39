use std::borrow::Cow;

/// Name of a virtual device at the broker.
///
/// The broker does not rely on NUL terminators, so the name always travels
/// together with its byte length. The name is also the broker-side key: two
/// live devices can never share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    name: String,
}

impl DeviceIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte length of the name as sent to the broker.
    pub fn name_len(&self) -> usize {
        self.name.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.name.as_bytes()
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Immutable HID report descriptor handed to the broker at create time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDescriptor {
    bytes: Cow<'static, [u8]>,
}

impl ReportDescriptor {
    /// Wrap a descriptor baked into the binary.
    pub const fn from_static(bytes: &'static [u8]) -> Self {
        Self {
            bytes: Cow::Borrowed(bytes),
        }
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Cow::Owned(bytes),
        }
    }

    /// The three-button relative mouse this crate drives.
    pub const fn mouse() -> Self {
        Self::from_static(crate::protocol::MOUSE_REPORT_DESCRIPTOR)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

bitflags::bitflags! {
    /// Mouse buttons carried in the low three bits of report byte 0.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[repr(C)]
    pub struct Buttons: u8 {
        const LEFT   = 1 << 0;
        const RIGHT  = 1 << 1;
        const MIDDLE = 1 << 2;
    }
}

/// One relative-motion mouse report.
///
/// Two views of the same contract: this struct and
/// [`MOUSE_REPORT_DESCRIPTOR`](crate::protocol::MOUSE_REPORT_DESCRIPTOR).
/// Changing one means changing the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputReport {
    pub buttons: Buttons,
    pub dx: i8,
    pub dy: i8,
}

impl InputReport {
    pub const fn new(buttons: Buttons, dx: i8, dy: i8) -> Self {
        Self { buttons, dx, dy }
    }

    /// Report with no buttons held and no motion.
    pub const fn idle() -> Self {
        Self::new(Buttons::empty(), 0, 0)
    }

    /// Encode to the 3-byte wire layout: buttons (reserved bits zero), dx, dy.
    pub fn to_bytes(&self) -> [u8; crate::protocol::MOUSE_REPORT_LEN] {
        crate::protocol::encode_mouse_report(self)
    }

    /// Decode a wire report. Reserved bits in byte 0 are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        crate::protocol::decode_mouse_report(bytes)
    }
}

/// One 6DOF measurement from the tracker.
///
/// Angles are in degrees, translation in the tracker's units.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseSample {
    pub heading: f32,
    pub pitch: f32,
    pub roll: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Advances whenever the tracker produces a new frame.
    pub frame_counter: u32,
}

/// Lifecycle of the tracking subsystem as seen by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingReadiness {
    Uninitialized,
    Initializing,
    Running,
    Paused,
    /// Tracker reports it was stopped; not usable until re-initialized.
    Stopped,
    Failed,
}

impl TrackingReadiness {
    /// Running or Paused: samples can be requested.
    pub fn is_ready(self) -> bool {
        matches!(self, TrackingReadiness::Running | TrackingReadiness::Paused)
    }
}

/// Broker-side state of the one virtual device this process manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Absent,
    Created,
}

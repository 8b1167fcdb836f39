use crate::types::{Buttons, InputReport};
use std::marker::PhantomData;

// -- Broker identity --
pub const FOOHID_SERVICE: &str = "it_unbit_foohid";
pub const DEFAULT_DEVICE_NAME: &str = "Virtual GamePad FooBar";

/// `kern_return_t` success value.
pub const KERN_SUCCESS: i32 = 0;

/// Operations exposed by the broker's user client.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerMethod {
    Create = 0,
    Destroy = 1,
    Send = 2,
    /// Defined by the broker, not used by this crate.
    List = 3,
}

impl BrokerMethod {
    pub fn selector(self) -> u32 {
        self as u32
    }

    /// Number of 64-bit scalars the method expects.
    pub fn arity(self) -> usize {
        match self {
            BrokerMethod::Create | BrokerMethod::Send | BrokerMethod::List => 4,
            BrokerMethod::Destroy => 2,
        }
    }

    pub fn from_selector(selector: u32) -> Option<Self> {
        match selector {
            0 => Some(BrokerMethod::Create),
            1 => Some(BrokerMethod::Destroy),
            2 => Some(BrokerMethod::Send),
            3 => Some(BrokerMethod::List),
            _ => None,
        }
    }
}

impl std::fmt::Display for BrokerMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BrokerMethod::Create => "create",
            BrokerMethod::Destroy => "destroy",
            BrokerMethod::Send => "send",
            BrokerMethod::List => "list",
        })
    }
}

/// Scalar argument vector for one broker call.
///
/// Buffer addresses are passed as plain integers and dereferenced by the
/// broker synchronously, in its own protection domain, while the call is in
/// flight. The `'a` borrow pins every referenced buffer for as long as the
/// vector exists, so the buffers cannot move or be freed before the call
/// returns and the vector is dropped.
#[derive(Debug)]
pub struct ScalarArgs<'a, const N: usize> {
    scalars: [u64; N],
    _buffers: PhantomData<&'a [u8]>,
}

impl<'a> ScalarArgs<'a, 2> {
    /// `{ptr, len}`, used by DESTROY.
    pub fn single(buffer: &'a [u8]) -> Self {
        Self {
            scalars: [buffer_addr(buffer), buffer.len() as u64],
            _buffers: PhantomData,
        }
    }
}

impl<'a> ScalarArgs<'a, 4> {
    /// `{a_ptr, a_len, b_ptr, b_len}`, used by CREATE and SEND.
    pub fn pair(a: &'a [u8], b: &'a [u8]) -> Self {
        Self {
            scalars: [
                buffer_addr(a),
                a.len() as u64,
                buffer_addr(b),
                b.len() as u64,
            ],
            _buffers: PhantomData,
        }
    }
}

impl<const N: usize> ScalarArgs<'_, N> {
    pub fn as_slice(&self) -> &[u64] {
        &self.scalars
    }
}

fn buffer_addr(buffer: &[u8]) -> u64 {
    buffer.as_ptr() as usize as u64
}

// -- Mouse report contract --

/// Bytes in one mouse input report.
pub const MOUSE_REPORT_LEN: usize = 3;

/// Bits of report byte 0 that carry buttons; the remaining five are padding.
pub const BUTTON_MASK: u8 = 0b0000_0111;

/// Three-button mouse with relative 8-bit X/Y.
pub const MOUSE_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // USAGE_PAGE (Generic Desktop)
    0x09, 0x02, // USAGE (Mouse)
    0xa1, 0x01, // COLLECTION (Application)
    0x09, 0x01, //   USAGE (Pointer)
    0xa1, 0x00, //   COLLECTION (Physical)
    0x05, 0x09, //     USAGE_PAGE (Button)
    0x19, 0x01, //     USAGE_MINIMUM (Button 1)
    0x29, 0x03, //     USAGE_MAXIMUM (Button 3)
    0x15, 0x00, //     LOGICAL_MINIMUM (0)
    0x25, 0x01, //     LOGICAL_MAXIMUM (1)
    0x95, 0x03, //     REPORT_COUNT (3)
    0x75, 0x01, //     REPORT_SIZE (1)
    0x81, 0x02, //     INPUT (Data,Var,Abs)
    0x95, 0x01, //     REPORT_COUNT (1)
    0x75, 0x05, //     REPORT_SIZE (5)
    0x81, 0x03, //     INPUT (Cnst,Var,Abs)
    0x05, 0x01, //     USAGE_PAGE (Generic Desktop)
    0x09, 0x30, //     USAGE (X)
    0x09, 0x31, //     USAGE (Y)
    0x15, 0x81, //     LOGICAL_MINIMUM (-127)
    0x25, 0x7f, //     LOGICAL_MAXIMUM (127)
    0x75, 0x08, //     REPORT_SIZE (8)
    0x95, 0x02, //     REPORT_COUNT (2)
    0x81, 0x06, //     INPUT (Data,Var,Rel)
    0xc0,       //   END_COLLECTION
    0xc0,       // END_COLLECTION
];

/// Encode a report: `[buttons & 0x07, dx, dy]`.
pub fn encode_mouse_report(report: &InputReport) -> [u8; MOUSE_REPORT_LEN] {
    [
        report.buttons.bits() & BUTTON_MASK,
        report.dx as u8,
        report.dy as u8,
    ]
}

/// Decode a report, dropping padding bits. `None` if the length is wrong.
pub fn decode_mouse_report(data: &[u8]) -> Option<InputReport> {
    if data.len() != MOUSE_REPORT_LEN {
        return None;
    }
    Some(InputReport {
        buttons: Buttons::from_bits_truncate(data[0] & BUTTON_MASK),
        dx: data[1] as i8,
        dy: data[2] as i8,
    })
}

/// Total size in bits of the input report declared by a descriptor.
///
/// Walks short items only far enough to sum `REPORT_SIZE * REPORT_COUNT` over
/// every INPUT main item. Returns `None` on a truncated item or when the
/// total does not fit in a `u32`.
pub fn input_report_bits(descriptor: &[u8]) -> Option<u32> {
    const TYPE_MAIN: u8 = 0;
    const TYPE_GLOBAL: u8 = 1;
    const TAG_INPUT: u8 = 0x8;
    const TAG_REPORT_SIZE: u8 = 0x7;
    const TAG_REPORT_COUNT: u8 = 0x9;
    const LONG_ITEM: u8 = 0xFE;

    let mut report_size = 0u32;
    let mut report_count = 0u32;
    let mut total = 0u32;
    let mut i = 0usize;

    while i < descriptor.len() {
        let prefix = descriptor[i];
        if prefix == LONG_ITEM {
            let data_len = *descriptor.get(i + 1)? as usize;
            i += 3 + data_len;
            continue;
        }

        let size = match prefix & 0x03 {
            3 => 4,
            n => n as usize,
        };
        let data = descriptor.get(i + 1..i + 1 + size)?;
        let value = data
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32);

        let item_type = (prefix >> 2) & 0x03;
        let tag = prefix >> 4;
        match (item_type, tag) {
            (TYPE_GLOBAL, TAG_REPORT_SIZE) => report_size = value,
            (TYPE_GLOBAL, TAG_REPORT_COUNT) => report_count = value,
            (TYPE_MAIN, TAG_INPUT) => {
                total = report_size
                    .checked_mul(report_count)
                    .and_then(|bits| total.checked_add(bits))?;
            }
            _ => {}
        }

        i += 1 + size;
    }

    Some(total)
}

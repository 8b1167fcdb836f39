use crate::protocol::BrokerMethod;
use std::fmt;

/// Why a broker session could not be opened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("no '{service}' service registered")]
    ServiceNotFound { service: String },

    #[error("'{service}' refused to open a session (kern_return 0x{code:08x})")]
    OpenRejected { service: String, code: i32 },
}

/// Raw outcome reported by the broker for a rejected call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerStatus {
    /// The call itself failed with this `kern_return_t`.
    Call(i32),
    /// The call completed but the broker's scalar output was non-zero.
    Output(u64),
}

impl fmt::Display for BrokerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerStatus::Call(code) => write!(f, "kern_return 0x{:08x}", code),
            BrokerStatus::Output(value) => write!(f, "output {}", value),
        }
    }
}

/// Errors that can occur while driving the virtual device or the tracker.
#[derive(Debug, thiserror::Error)]
pub enum PosehidError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(#[from] ConnectionError),

    #[error("Broker rejected create ({0})")]
    CreateRejected(BrokerStatus),

    #[error("Broker rejected send ({0})")]
    SendRejected(BrokerStatus),

    #[error("Broker rejected destroy ({0})")]
    DestroyRejected(BrokerStatus),

    #[error("Tracker initialization failed: {0}")]
    TrackerInit(String),

    #[error("Tracker not ready after {attempts} polls")]
    TrackerTimeout { attempts: u32 },

    #[error("Tracker library error: {0}")]
    TrackerLibrary(#[from] libloading::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PosehidError {
    /// Broker operation a rejection belongs to.
    pub fn method(&self) -> Option<BrokerMethod> {
        match self {
            PosehidError::CreateRejected(_) => Some(BrokerMethod::Create),
            PosehidError::SendRejected(_) => Some(BrokerMethod::Send),
            PosehidError::DestroyRejected(_) => Some(BrokerMethod::Destroy),
            _ => None,
        }
    }

    /// Raw broker status, for rejections.
    pub fn broker_status(&self) -> Option<BrokerStatus> {
        match self {
            PosehidError::CreateRejected(s)
            | PosehidError::SendRejected(s)
            | PosehidError::DestroyRejected(s) => Some(*s),
            _ => None,
        }
    }

    /// Numeric code used by the C API: -1 argument, -2 unavailable, -3 rejected, -4 other.
    pub fn code(&self) -> i32 {
        match self {
            PosehidError::InvalidArgument(_) => -1,
            PosehidError::BrokerUnavailable(_) => -2,
            PosehidError::CreateRejected(_)
            | PosehidError::SendRejected(_)
            | PosehidError::DestroyRejected(_) => -3,
            _ => -4,
        }
    }
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &PosehidError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut msg) = self.message.lock() {
            msg.clear();
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}

//! Linuxtrack backend for [`Tracker`], loaded from the shared library at
//! runtime so the crate builds and runs without it installed.

use crate::tracking::{Tracker, TrackerStatus};
use crate::types::PoseSample;
use crate::Result;
use libloading::Library;
use std::ffi::{c_char, c_int, CStr, CString, OsStr};

#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY: &str = "liblinuxtrack.0.dylib";
#[cfg(not(target_os = "macos"))]
pub const DEFAULT_LIBRARY: &str = "liblinuxtrack.so.0";

type InitFn = unsafe extern "C" fn(*const c_char) -> c_int;
type StateFn = unsafe extern "C" fn() -> c_int;
type ExplainFn = unsafe extern "C" fn(c_int) -> *const c_char;
type PoseFn = unsafe extern "C" fn(
    *mut f32,
    *mut f32,
    *mut f32,
    *mut f32,
    *mut f32,
    *mut f32,
    *mut u32,
) -> c_int;

/// Handle to a loaded `liblinuxtrack`.
pub struct Linuxtrack {
    init: InitFn,
    state: StateFn,
    explain: ExplainFn,
    pose: PoseFn,
    shutdown: Option<StateFn>,
    initialized: bool,
    // Declared last: function pointers above must not outlive the library.
    _library: Library,
}

impl Linuxtrack {
    /// Load the library at `path` (a file path or a name resolved by the
    /// dynamic loader) and resolve the client API.
    pub fn load(path: impl AsRef<OsStr>) -> Result<Self> {
        let path = path.as_ref();
        let library = unsafe { Library::new(path)? };

        let (init, state, explain, pose, shutdown) = unsafe {
            (
                *library.get::<InitFn>(b"linuxtrack_init\0")?,
                *library.get::<StateFn>(b"linuxtrack_get_tracking_state\0")?,
                *library.get::<ExplainFn>(b"linuxtrack_explain\0")?,
                *library.get::<PoseFn>(b"linuxtrack_get_pose\0")?,
                library
                    .get::<StateFn>(b"linuxtrack_shutdown\0")
                    .ok()
                    .map(|sym| *sym),
            )
        };

        log::info!("Loaded tracker library {:?}", path);
        Ok(Self {
            init,
            state,
            explain,
            pose,
            shutdown,
            initialized: false,
            _library: library,
        })
    }

    /// Load from [`DEFAULT_LIBRARY`].
    pub fn load_default() -> Result<Self> {
        Self::load(DEFAULT_LIBRARY)
    }
}

impl Tracker for Linuxtrack {
    fn init(&mut self, profile: Option<&str>) -> TrackerStatus {
        let profile = match profile.map(CString::new).transpose() {
            Ok(p) => p,
            Err(_) => {
                log::warn!("Tracker profile name contains a NUL byte");
                return TrackerStatus::NO_CONFIG;
            }
        };
        let ptr = profile.as_ref().map_or(std::ptr::null(), |p| p.as_ptr());
        let status = TrackerStatus(unsafe { (self.init)(ptr) });
        self.initialized = !status.is_error();
        status
    }

    fn status(&mut self) -> TrackerStatus {
        TrackerStatus(unsafe { (self.state)() })
    }

    fn explain(&self, status: TrackerStatus) -> String {
        let text = unsafe { (self.explain)(status.0) };
        if text.is_null() {
            return status.describe().to_string();
        }
        unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
    }

    fn pose(&mut self) -> (PoseSample, i32) {
        let mut s = PoseSample::default();
        let available = unsafe {
            (self.pose)(
                &mut s.heading,
                &mut s.pitch,
                &mut s.roll,
                &mut s.x,
                &mut s.y,
                &mut s.z,
                &mut s.frame_counter,
            )
        };
        (s, available)
    }

    fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        self.initialized = false;
        if let Some(shutdown) = self.shutdown {
            let status = TrackerStatus(unsafe { shutdown() });
            log::debug!("Tracker shutdown: {}", self.explain(status));
        }
    }
}

impl Drop for Linuxtrack {
    fn drop(&mut self) {
        self.shutdown();
    }
}

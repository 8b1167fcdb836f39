//! C FFI layer for posehid.
//!
//! Opaque handle around a [`VirtualDevice`] on the IOKit broker. The generated
//! C header is written to `include/posehid.h` by cbindgen.
//!
//! Functions returning `c_int` return 0 on success or a negative code:
//! -1 invalid argument, -2 broker unavailable, -3 rejected by the broker,
//! -4 tracker or configuration failure.

use crate::device::VirtualDevice;
use crate::error::{LastError, PosehidError};
use crate::iokit::IoKitBroker;
use crate::types::{Buttons, DeviceIdentity, InputReport, ReportDescriptor};
use std::ffi::{c_char, c_int, CStr};

/// Last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

/// Opaque device handle for C consumers.
pub struct PhDevice(VirtualDevice<IoKitBroker>);

fn status(result: crate::Result<()>) -> c_int {
    match result {
        Ok(()) => {
            LAST_ERROR.clear();
            0
        }
        Err(e) => {
            LAST_ERROR.set(&e);
            e.code()
        }
    }
}

/// Allocate a handle for the device called `name` (null selects the default
/// name). No broker call is made until `ph_device_create`.
/// Returns NULL on error (check ph_last_error()).
///
/// # Safety
/// `name` must be a valid null-terminated string, or null.
#[no_mangle]
pub unsafe extern "C" fn ph_device_new(name: *const c_char) -> *mut PhDevice {
    let name = if name.is_null() {
        crate::protocol::DEFAULT_DEVICE_NAME.to_string()
    } else {
        match CStr::from_ptr(name).to_str() {
            Ok(s) => s.to_string(),
            Err(_) => {
                LAST_ERROR.set(&PosehidError::InvalidArgument("device name is not UTF-8"));
                return std::ptr::null_mut();
            }
        }
    };
    let dev = VirtualDevice::new(IoKitBroker::default(), DeviceIdentity::new(name));
    Box::into_raw(Box::new(PhDevice(dev)))
}

/// Free a handle. Does not destroy the device on the broker side.
///
/// # Safety
/// `dev` must be a pointer returned by `ph_device_new`, or null.
#[no_mangle]
pub unsafe extern "C" fn ph_device_free(dev: *mut PhDevice) {
    if !dev.is_null() {
        drop(Box::from_raw(dev));
    }
}

/// Create the device with the built-in three-button mouse descriptor.
///
/// # Safety
/// `dev` must be a valid device pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn ph_device_create(dev: *const PhDevice) -> c_int {
    let Some(dev) = dev.as_ref() else {
        return status(Err(PosehidError::InvalidArgument("null device")));
    };
    status(dev.0.create(&ReportDescriptor::mouse()))
}

/// Create the device with a caller-supplied report descriptor.
///
/// # Safety
/// `dev` must be a valid device pointer, or null. `desc` must point to
/// `len` readable bytes, or be null.
#[no_mangle]
pub unsafe extern "C" fn ph_device_create_with(
    dev: *const PhDevice,
    desc: *const u8,
    len: usize,
) -> c_int {
    let Some(dev) = dev.as_ref() else {
        return status(Err(PosehidError::InvalidArgument("null device")));
    };
    if desc.is_null() || len == 0 {
        return status(Err(PosehidError::InvalidArgument("empty report descriptor")));
    }
    let bytes = std::slice::from_raw_parts(desc, len).to_vec();
    status(dev.0.create(&ReportDescriptor::from_vec(bytes)))
}

/// Send one mouse report. Only the low three bits of `buttons` are used.
///
/// # Safety
/// `dev` must be a valid device pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn ph_device_send(
    dev: *const PhDevice,
    buttons: u8,
    dx: i8,
    dy: i8,
) -> c_int {
    let Some(dev) = dev.as_ref() else {
        return status(Err(PosehidError::InvalidArgument("null device")));
    };
    let report = InputReport::new(Buttons::from_bits_truncate(buttons), dx, dy);
    status(dev.0.send(&report))
}

/// Destroy the device on the broker side.
///
/// # Safety
/// `dev` must be a valid device pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn ph_device_destroy(dev: *const PhDevice) -> c_int {
    let Some(dev) = dev.as_ref() else {
        return status(Err(PosehidError::InvalidArgument("null device")));
    };
    status(dev.0.destroy())
}

/// Get the last error message. Returns NULL if the last call succeeded.
/// The returned pointer is valid until the next posehid API call.
#[no_mangle]
pub extern "C" fn ph_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_null_handle_is_invalid_argument() {
        unsafe {
            assert_eq!(ph_device_create(std::ptr::null()), -1);
            assert_eq!(ph_device_send(std::ptr::null(), 1, 0, 0), -1);
            assert_eq!(ph_device_destroy(std::ptr::null()), -1);
        }
        assert!(!ph_last_error().is_null());
    }

    #[test]
    fn test_new_and_free() {
        let name = CString::new("VGP").unwrap();
        unsafe {
            let dev = ph_device_new(name.as_ptr());
            assert!(!dev.is_null());
            assert_eq!((*dev).0.identity().name(), "VGP");
            ph_device_free(dev);

            let dev = ph_device_new(std::ptr::null());
            assert_eq!((*dev).0.identity().name(), crate::protocol::DEFAULT_DEVICE_NAME);
            ph_device_free(dev);
            ph_device_free(std::ptr::null_mut());
        }
    }

    #[test]
    fn test_empty_descriptor_rejected() {
        let dev = unsafe { ph_device_new(std::ptr::null()) };
        unsafe {
            assert_eq!(ph_device_create_with(dev, std::ptr::null(), 0), -1);
            ph_device_free(dev);
        }
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_create_without_broker() {
        let dev = unsafe { ph_device_new(std::ptr::null()) };
        unsafe {
            assert_eq!(ph_device_create(dev), -2);
            ph_device_free(dev);
        }
    }
}

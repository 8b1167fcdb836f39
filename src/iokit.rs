//! IOKit transport to the foohid kernel extension.
//!
//! The broker registers an IOService under a well-known class name. Opening
//! it yields an `io_connect_t` whose scalar methods implement the device
//! lifecycle. Only macOS has IOKit; elsewhere [`IoKitBroker::open`] reports
//! the service as not found.

use crate::broker::{Broker, Connection};
use crate::error::ConnectionError;
use crate::protocol::{BrokerMethod, FOOHID_SERVICE};

/// Broker reached through IOKit service matching.
#[derive(Debug, Clone)]
pub struct IoKitBroker {
    service: String,
}

impl IoKitBroker {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

impl Default for IoKitBroker {
    fn default() -> Self {
        Self::new(FOOHID_SERVICE)
    }
}

#[cfg(target_os = "macos")]
mod sys {
    #![allow(non_camel_case_types, non_upper_case_globals)]

    use std::ffi::{c_char, c_void};

    pub type kern_return_t = i32;
    pub type mach_port_t = u32;
    pub type io_object_t = mach_port_t;
    pub type io_iterator_t = io_object_t;
    pub type io_service_t = io_object_t;
    pub type io_connect_t = mach_port_t;

    pub const KERN_SUCCESS: kern_return_t = 0;
    pub const IO_OBJECT_NULL: io_object_t = 0;
    /// `kIOMainPortDefault` / `kIOMasterPortDefault`.
    pub const MAIN_PORT_DEFAULT: mach_port_t = 0;

    #[link(name = "IOKit", kind = "framework")]
    extern "C" {
        pub fn IOServiceMatching(name: *const c_char) -> *mut c_void;
        pub fn IOServiceGetMatchingServices(
            main_port: mach_port_t,
            matching: *mut c_void,
            existing: *mut io_iterator_t,
        ) -> kern_return_t;
        pub fn IOIteratorNext(iterator: io_iterator_t) -> io_object_t;
        pub fn IOObjectRelease(object: io_object_t) -> kern_return_t;
        pub fn IOServiceOpen(
            service: io_service_t,
            owning_task: mach_port_t,
            connect_type: u32,
            connect: *mut io_connect_t,
        ) -> kern_return_t;
        pub fn IOServiceClose(connect: io_connect_t) -> kern_return_t;
        pub fn IOConnectCallScalarMethod(
            connection: io_connect_t,
            selector: u32,
            input: *const u64,
            input_cnt: u32,
            output: *mut u64,
            output_cnt: *mut u32,
        ) -> kern_return_t;
    }

    extern "C" {
        /// Backing storage of the `mach_task_self()` macro.
        pub static mach_task_self_: mach_port_t;
    }

    /// Owned IOKit object reference, released on drop.
    pub struct IoObject(pub io_object_t);

    impl Drop for IoObject {
        fn drop(&mut self) {
            if self.0 != IO_OBJECT_NULL {
                unsafe {
                    IOObjectRelease(self.0);
                }
            }
        }
    }
}

/// Open user-client connection to the broker.
pub struct IoKitConnection {
    #[cfg(target_os = "macos")]
    connect: sys::io_connect_t,
}

#[cfg(target_os = "macos")]
impl Broker for IoKitBroker {
    type Connection = IoKitConnection;

    /// Enumerate every matching service and keep the first one that accepts
    /// an open. Each enumerated service object is released either way.
    fn open(&self) -> Result<IoKitConnection, ConnectionError> {
        use std::ffi::CString;

        let not_found = || ConnectionError::ServiceNotFound {
            service: self.service.clone(),
        };

        let class = CString::new(self.service.as_str()).map_err(|_| not_found())?;

        let mut raw_iter: sys::io_iterator_t = sys::IO_OBJECT_NULL;
        // IOServiceGetMatchingServices consumes the matching dictionary.
        let ret = unsafe {
            let matching = sys::IOServiceMatching(class.as_ptr());
            if matching.is_null() {
                return Err(not_found());
            }
            sys::IOServiceGetMatchingServices(sys::MAIN_PORT_DEFAULT, matching, &mut raw_iter)
        };
        if ret != sys::KERN_SUCCESS {
            log::debug!("IOServiceGetMatchingServices({}) = 0x{:08x}", self.service, ret);
            return Err(not_found());
        }
        let iter = sys::IoObject(raw_iter);

        let mut last_rejection: Option<i32> = None;
        loop {
            let service = sys::IoObject(unsafe { sys::IOIteratorNext(iter.0) });
            if service.0 == sys::IO_OBJECT_NULL {
                break;
            }

            let mut connect: sys::io_connect_t = 0;
            let ret =
                unsafe { sys::IOServiceOpen(service.0, sys::mach_task_self_, 0, &mut connect) };
            if ret == sys::KERN_SUCCESS {
                log::trace!("Opened {} (connect=0x{:x})", self.service, connect);
                return Ok(IoKitConnection { connect });
            }

            log::debug!("IOServiceOpen({}) refused: 0x{:08x}", self.service, ret);
            last_rejection = Some(ret);
        }

        match last_rejection {
            Some(code) => Err(ConnectionError::OpenRejected {
                service: self.service.clone(),
                code,
            }),
            None => Err(not_found()),
        }
    }
}

#[cfg(not(target_os = "macos"))]
impl Broker for IoKitBroker {
    type Connection = IoKitConnection;

    fn open(&self) -> Result<IoKitConnection, ConnectionError> {
        log::debug!("IOKit is not available on this platform");
        Err(ConnectionError::ServiceNotFound {
            service: self.service.clone(),
        })
    }
}

#[cfg(target_os = "macos")]
impl Connection for IoKitConnection {
    fn call_scalar(&mut self, method: BrokerMethod, input: &[u64]) -> Result<u64, i32> {
        let mut output: u64 = 0;
        let mut output_count: u32 = 1;
        let ret = unsafe {
            sys::IOConnectCallScalarMethod(
                self.connect,
                method.selector(),
                input.as_ptr(),
                input.len() as u32,
                &mut output,
                &mut output_count,
            )
        };
        check_scalar_output(ret, output, output_count)
    }

    fn close(&mut self) {
        if self.connect != 0 {
            unsafe {
                sys::IOServiceClose(self.connect);
            }
            self.connect = 0;
        }
    }
}

/// `kIOReturnBadArgument`
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
const IO_RETURN_BAD_ARGUMENT: i32 = 0xe00002c2_u32 as i32;

/// Interpret a scalar call: the broker answers with exactly one output.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn check_scalar_output(ret: i32, output: u64, output_count: u32) -> Result<u64, i32> {
    if ret != 0 {
        return Err(ret);
    }
    if output_count != 1 {
        log::debug!("Broker returned {} scalar outputs, expected 1", output_count);
        return Err(IO_RETURN_BAD_ARGUMENT);
    }
    Ok(output)
}

#[cfg(not(target_os = "macos"))]
impl Connection for IoKitConnection {
    fn call_scalar(&mut self, _method: BrokerMethod, _input: &[u64]) -> Result<u64, i32> {
        // kIOReturnUnsupported
        Err(0xe00002c7_u32 as i32)
    }

    fn close(&mut self) {}
}

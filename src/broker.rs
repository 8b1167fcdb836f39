//! Session layer between the virtual device handle and the privileged broker.
//!
//! Every lifecycle call opens its own [`Session`], uses it once, and closes
//! it. Sessions are never cached or shared. Closing happens in `Drop`, so an
//! early return or a failed call still releases the session.

use crate::error::{BrokerStatus, ConnectionError};
use crate::protocol::{BrokerMethod, ScalarArgs};

/// An open connection to the broker's user client.
pub trait Connection {
    /// Invoke a scalar method expecting exactly one scalar output.
    ///
    /// `Ok(output)` when the call completed (the output may still signal a
    /// broker-side failure), `Err(kern_return)` when the call itself failed.
    fn call_scalar(&mut self, method: BrokerMethod, input: &[u64]) -> Result<u64, i32>;

    /// Release the connection. Must be safe to call on an already closed
    /// connection.
    fn close(&mut self);
}

/// Something that can open sessions with the broker.
pub trait Broker {
    type Connection: Connection;

    /// Locate the broker and open a raw connection.
    fn open(&self) -> Result<Self::Connection, ConnectionError>;

    /// Open a scoped session that closes itself on drop.
    fn connect(&self) -> Result<Session<Self::Connection>, ConnectionError> {
        self.open().map(Session::new)
    }
}

impl<B: Broker + ?Sized> Broker for &B {
    type Connection = B::Connection;

    fn open(&self) -> Result<Self::Connection, ConnectionError> {
        (**self).open()
    }
}

/// A broker connection scoped to a single lifecycle call.
pub struct Session<C: Connection> {
    conn: C,
}

impl<C: Connection> Session<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    /// Invoke `method` and interpret the scalar output (0 = success).
    ///
    /// The argument vector borrows every buffer it references, so those
    /// buffers outlive the call.
    pub fn invoke<const N: usize>(
        &mut self,
        method: BrokerMethod,
        args: &ScalarArgs<'_, N>,
    ) -> Result<(), BrokerStatus> {
        debug_assert_eq!(N, method.arity(), "wrong arity for {}", method);

        match self.conn.call_scalar(method, args.as_slice()) {
            Ok(0) => Ok(()),
            Ok(output) => Err(BrokerStatus::Output(output)),
            Err(code) => Err(BrokerStatus::Call(code)),
        }
    }

    /// Close now instead of at end of scope.
    pub fn close(self) {}
}

impl<C: Connection> Drop for Session<C> {
    fn drop(&mut self) {
        self.conn.close();
    }
}

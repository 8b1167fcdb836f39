use crate::broker::Broker;
use crate::error::BrokerStatus;
use crate::protocol::{BrokerMethod, ScalarArgs};
use crate::types::{DeviceIdentity, InputReport, ReportDescriptor};
use crate::{PosehidError, Result};

/// Handle to one named virtual device at the broker.
///
/// The handle keeps no client-side record of whether the device exists;
/// the broker is the source of truth and rejects sends to unknown names.
/// Each operation validates its arguments, opens its own session, makes one
/// call and closes the session before interpreting the result.
pub struct VirtualDevice<B: Broker> {
    broker: B,
    identity: DeviceIdentity,
}

impl<B: Broker> VirtualDevice<B> {
    pub fn new(broker: B, identity: DeviceIdentity) -> Self {
        Self { broker, identity }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Register the device with the broker using `descriptor`.
    ///
    /// Fails with `CreateRejected` if the name is taken, the descriptor is
    /// malformed, or the broker is out of resources.
    pub fn create(&self, descriptor: &ReportDescriptor) -> Result<()> {
        let name = self.name_bytes()?;
        if descriptor.is_empty() {
            return Err(PosehidError::InvalidArgument("empty report descriptor"));
        }

        let args = ScalarArgs::pair(name, descriptor.as_bytes());
        self.call(BrokerMethod::Create, &args)?
            .map_err(PosehidError::CreateRejected)?;

        log::info!(
            "Created virtual device '{}' ({} byte descriptor)",
            self.identity,
            descriptor.len()
        );
        Ok(())
    }

    /// Deliver one input report. Fire-and-forget: no retry on failure.
    pub fn send(&self, report: &InputReport) -> Result<()> {
        self.send_raw(&report.to_bytes())
    }

    /// Deliver raw report bytes, which must match the registered descriptor.
    pub fn send_raw(&self, report: &[u8]) -> Result<()> {
        let name = self.name_bytes()?;
        if report.is_empty() {
            return Err(PosehidError::InvalidArgument("empty report"));
        }

        let args = ScalarArgs::pair(name, report);
        self.call(BrokerMethod::Send, &args)?
            .map_err(PosehidError::SendRejected)
    }

    /// Remove the device from the broker.
    ///
    /// `DestroyRejected` is the normal answer when no such device exists.
    pub fn destroy(&self) -> Result<()> {
        let name = self.name_bytes()?;

        let args = ScalarArgs::single(name);
        self.call(BrokerMethod::Destroy, &args)?
            .map_err(PosehidError::DestroyRejected)?;

        log::info!("Destroyed virtual device '{}'", self.identity);
        Ok(())
    }

    fn name_bytes(&self) -> Result<&[u8]> {
        let name = self.identity.as_bytes();
        if name.is_empty() {
            return Err(PosehidError::InvalidArgument("empty device name"));
        }
        Ok(name)
    }

    /// Open a session, invoke `method`, close the session.
    ///
    /// The outer result fails when the broker cannot be reached; the inner
    /// one carries the broker's verdict.
    fn call<const N: usize>(
        &self,
        method: BrokerMethod,
        args: &ScalarArgs<'_, N>,
    ) -> Result<std::result::Result<(), BrokerStatus>> {
        let mut session = self.broker.connect().map_err(|e| {
            log::debug!("{} '{}': broker unavailable: {}", method, self.identity, e);
            e
        })?;
        let result = session.invoke(method, args);
        session.close();

        if let Err(status) = &result {
            log::debug!("{} '{}' rejected: {}", method, self.identity, status);
        }
        Ok(result)
    }
}

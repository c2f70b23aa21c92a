use myrtio_light_sequencer::{ChannelDriver, DriverError, GroupAddress};
use tracing::info;

/// Driver that reports channel changes through `tracing` instead of a bus
#[derive(Debug, Default)]
pub(crate) struct TracingDriver {
    writes: usize,
}

impl TracingDriver {
    pub(crate) fn writes(&self) -> usize {
        self.writes
    }
}

impl ChannelDriver<GroupAddress> for TracingDriver {
    fn set_on(&mut self, address: GroupAddress) -> Result<(), DriverError> {
        self.writes += 1;
        info!(%address, raw = address.to_raw(), "on");
        Ok(())
    }

    fn set_off(&mut self, address: GroupAddress) -> Result<(), DriverError> {
        self.writes += 1;
        info!(%address, raw = address.to_raw(), "off");
        Ok(())
    }
}

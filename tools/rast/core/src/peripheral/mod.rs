pub mod sim_memory;
pub mod trace;

use crate::pins::PinOutputs;
use crate::Result;

/// The memory peripheral on the far side of the bus.
///
/// Called once per clock edge with the pins the accelerator drives for that cycle.
/// Returns the byte presented on `ui_in`, which the accelerator samples at the end of
/// the cycle. Outside the data cycle of a read the value is ignored.
pub trait Peripheral {
    fn clock(&mut self, pins: &PinOutputs) -> Result<u8>;
}


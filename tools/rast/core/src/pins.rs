use core::fmt;
use bitfield::bitfield;

/// `uio_oe` value driving all eight bidirectional pins.
pub const OUTPUT: u8 = 0xFF;
/// `uio_oe` value releasing the bidirectional pins to the peripheral.
pub const INPUT: u8 = 0x00;

/// Everything the accelerator drives during a single clock cycle.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PinOutputs {
    pub uo_out: u8,
    pub uio_out: u8,
    pub uio_oe: u8,
}

impl PinOutputs {
    /// Bus released, nothing in flight.
    pub const IDLE: PinOutputs = PinOutputs { uo_out: 0, uio_out: 0, uio_oe: INPUT };

    #[inline(always)]
    pub const fn driven(uo_out: u8, uio_out: u8) -> Self {
        Self { uo_out, uio_out, uio_oe: OUTPUT }
    }

    #[inline(always)]
    pub fn is_driving(&self) -> bool {
        self.uio_oe == OUTPUT
    }

    #[inline(always)]
    pub fn is_released(&self) -> bool {
        self.uio_oe == INPUT
    }
}

impl fmt::Display for PinOutputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uo_out={:02X} uio_out={:02X} uio_oe={:02X}", self.uo_out, self.uio_out, self.uio_oe)
    }
}

bitfield! {
    /// Global control inputs. `rst_n` is active low.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct ControlPins(u8);
    impl Debug;
    pub rst_n, set_rst_n: 0;
    pub ena, set_ena: 1;
}

impl ControlPins {
    /// Power-on state: reset asserted, disabled.
    pub const fn power_on() -> Self {
        ControlPins(0)
    }

    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.rst_n() && self.ena()
    }
}

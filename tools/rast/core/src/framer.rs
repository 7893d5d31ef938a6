use bit_field::BitField;
use log::trace;
use crate::peripheral::Peripheral;
use crate::pins::{PinOutputs, INPUT, OUTPUT};
use crate::{Error, Result};

pub const CYCLES_PER_TRANSFER: u64 = 3;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    /// Byte driven on `uio_out` during the second address cycle.
    #[inline(always)]
    pub const fn flag(self) -> u8 {
        match self {
            Direction::Read => 0x00,
            Direction::Write => 0xFF,
        }
    }

    pub fn from_flag(flag: u8) -> Option<Direction> {
        match flag {
            0x00 => Some(Direction::Read),
            0xFF => Some(Direction::Write),
            _ => None,
        }
    }
}

/// A single byte moved across the bus in three cycles.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BusTransfer {
    pub address: u32,
    pub direction: Direction,
    pub data: u8,
}

impl BusTransfer {
    pub fn read(address: u32) -> Self {
        Self { address, direction: Direction::Read, data: 0 }
    }

    pub fn write(address: u32, data: u8) -> Self {
        Self { address, direction: Direction::Write, data }
    }
}

/// Initiator side of the bus: turns transfers into pin states and clocks them out.
pub struct BusFramer;

impl BusFramer {
    /// The two address cycles followed by the data cycle.
    pub fn frame(transfer: &BusTransfer) -> [PinOutputs; 3] {
        let address = transfer.address;
        let low = address.get_bits(0..8) as u8;
        let mid = address.get_bits(8..16) as u8;
        let high = address.get_bits(16..24) as u8;

        let data = match transfer.direction {
            Direction::Write => PinOutputs::driven(transfer.data, 0),
            Direction::Read => PinOutputs::IDLE,
        };

        [
            PinOutputs::driven(low, mid),
            PinOutputs::driven(high, transfer.direction.flag()),
            data,
        ]
    }

    /// Cycles 1 and 2: establish address and direction.
    pub fn send_address<P: Peripheral + ?Sized>(peripheral: &mut P, address: u32, direction: Direction) -> Result<()> {
        let [first, second, _] = Self::frame(&BusTransfer { address, direction, data: 0 });
        peripheral.clock(&first)?;
        peripheral.clock(&second)?;
        Ok(())
    }

    /// Cycle 3: drive the data byte, or sample `ui_in` at the end of the cycle.
    pub fn transfer_data<P: Peripheral + ?Sized>(peripheral: &mut P, direction: Direction, data: u8) -> Result<u8> {
        match direction {
            Direction::Write => {
                peripheral.clock(&PinOutputs::driven(data, 0))?;
                Ok(data)
            }
            Direction::Read => peripheral.clock(&PinOutputs::IDLE),
        }
    }

    /// Runs one complete transfer, returning the byte that crossed the bus.
    pub fn transfer<P: Peripheral + ?Sized>(peripheral: &mut P, transfer: BusTransfer) -> Result<u8> {
        Self::send_address(peripheral, transfer.address, transfer.direction)?;
        let data = Self::transfer_data(peripheral, transfer.direction, transfer.data)?;
        trace!(target: "bus", "{:?} ${:06X} = {:02X}", transfer.direction, transfer.address, data);
        Ok(data)
    }
}

/// Where the decoder is within a frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    AddressHigh,
    Data,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Bus released outside a frame.
    Idle,
    /// Part of an address was latched.
    Address,
    /// The third cycle completed a transfer. For reads `data` is zero and
    /// the peripheral answers on `ui_in`.
    Transfer(BusTransfer),
}

#[derive(Debug, Copy, Clone)]
enum State {
    Idle,
    AddressHigh { low: u8, mid: u8 },
    Data { address: u32, direction: Direction },
}

/// Peripheral side of the bus: reassembles transfers from successive pin states
/// and flags anything that breaks the framing.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: State,
    cycle: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self { state: State::Idle, cycle: 0 }
    }

    pub fn phase(&self) -> FramePhase {
        match self.state {
            State::Idle => FramePhase::Idle,
            State::AddressHigh { .. } => FramePhase::AddressHigh,
            State::Data { .. } => FramePhase::Data,
        }
    }

    /// Cycles observed so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn clock(&mut self, pins: &PinOutputs) -> Result<Decoded> {
        let cycle = self.cycle;
        self.cycle += 1;

        let phase = self.phase();
        let violation = |expected: &'static str| Error::ProtocolViolation {
            cycle,
            phase,
            expected,
            observed: *pins,
        };

        let (next, decoded) = match self.state {
            State::Idle => match pins.uio_oe {
                INPUT => (State::Idle, Ok(Decoded::Idle)),
                OUTPUT => (State::AddressHigh { low: pins.uo_out, mid: pins.uio_out }, Ok(Decoded::Address)),
                _ => (State::Idle, Err(violation("uio_oe all-input or all-output"))),
            },
            State::AddressHigh { low, mid } => {
                if !pins.is_driving() {
                    (State::Idle, Err(violation("uio_oe output while sending the address")))
                } else if let Some(direction) = Direction::from_flag(pins.uio_out) {
                    let address = u32::from_le_bytes([low, mid, pins.uo_out, 0]);
                    (State::Data { address, direction }, Ok(Decoded::Address))
                } else {
                    (State::Idle, Err(violation("direction flag 00 or FF")))
                }
            }
            State::Data { address, direction } => match direction {
                Direction::Write if pins.is_driving() => {
                    (State::Idle, Ok(Decoded::Transfer(BusTransfer::write(address, pins.uo_out))))
                }
                Direction::Write => (State::Idle, Err(violation("uio_oe output while writing data"))),
                Direction::Read if pins.is_released() => {
                    (State::Idle, Ok(Decoded::Transfer(BusTransfer::read(address))))
                }
                Direction::Read => (State::Idle, Err(violation("uio_oe input while reading data"))),
            },
        };

        self.state = next;
        decoded
    }
}

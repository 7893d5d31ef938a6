use alloc::vec;
use alloc::vec::Vec;
use crate::framer::{BusFramer, BusTransfer, Direction, CYCLES_PER_TRANSFER};
use crate::memory_map::AddressSpace;
use crate::peripheral::Peripheral;
use crate::pins::PinOutputs;
use crate::{Error, Result};

/// Idle cycles clocked ahead of every request group unless configured otherwise.
pub const DEFAULT_TURNAROUND_CYCLES: u8 = 1;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Every clock edge, idle or not.
    pub cycles: u64,
    pub idle_cycles: u64,
    pub reads: u64,
    pub writes: u64,
}

impl BusStats {
    /// Counts accumulated after `earlier` was taken.
    pub fn since(&self, earlier: &BusStats) -> BusStats {
        BusStats {
            cycles: self.cycles - earlier.cycles,
            idle_cycles: self.idle_cycles - earlier.idle_cycles,
            reads: self.reads - earlier.reads,
            writes: self.writes - earlier.writes,
        }
    }

    pub fn transfers(&self) -> u64 {
        self.reads + self.writes
    }
}

/// Byte-serial READ and WRITE sequences on top of the framer.
///
/// Every byte is its own three-cycle transfer at consecutive addresses. Ranges are
/// checked against the memory map before the first cycle is clocked, so a rejected
/// request never touches the bus.
#[derive(Debug)]
pub struct MemoryEngine<P: Peripheral> {
    peripheral: P,
    turnaround_cycles: u8,
    stats: BusStats,
}

impl<P: Peripheral> MemoryEngine<P> {
    pub fn new(peripheral: P) -> Self {
        Self {
            peripheral,
            turnaround_cycles: DEFAULT_TURNAROUND_CYCLES,
            stats: BusStats::default(),
        }
    }

    pub fn set_turnaround(&mut self, cycles: u8) {
        self.turnaround_cycles = cycles;
    }

    pub fn turnaround(&self) -> u8 {
        self.turnaround_cycles
    }

    pub fn stats(&self) -> BusStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = BusStats::default();
    }

    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    pub fn peripheral_mut(&mut self) -> &mut P {
        &mut self.peripheral
    }

    pub fn into_peripheral(self) -> P {
        self.peripheral
    }

    /// Clocks `cycles` cycles with the bus released.
    pub fn idle(&mut self, cycles: u32) -> Result<()> {
        for _ in 0..cycles {
            self.peripheral.clock(&PinOutputs::IDLE)?;
            self.stats.cycles += 1;
            self.stats.idle_cycles += 1;
        }
        Ok(())
    }

    /// Reads `buf.len()` bytes starting at `address`.
    pub fn read_into(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        Self::check(address, buf.len(), Direction::Read)?;
        self.idle(self.turnaround_cycles as u32)?;

        for (offset, byte) in buf.iter_mut().enumerate() {
            *byte = self.transfer(BusTransfer::read(address + offset as u32))?;
        }
        Ok(())
    }

    pub fn read(&mut self, address: u32, count: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; count];
        self.read_into(address, &mut bytes)?;
        Ok(bytes)
    }

    pub fn write(&mut self, address: u32, bytes: &[u8]) -> Result<()> {
        Self::check(address, bytes.len(), Direction::Write)?;
        self.idle(self.turnaround_cycles as u32)?;

        for (offset, &byte) in bytes.iter().enumerate() {
            self.transfer(BusTransfer::write(address + offset as u32, byte))?;
        }
        Ok(())
    }

    fn transfer(&mut self, transfer: BusTransfer) -> Result<u8> {
        let data = BusFramer::transfer(&mut self.peripheral, transfer)?;
        self.stats.cycles += CYCLES_PER_TRANSFER;
        match transfer.direction {
            Direction::Read => self.stats.reads += 1,
            Direction::Write => self.stats.writes += 1,
        }
        Ok(data)
    }

    /// Descriptor space is read-only and the framebuffer write-only from this side.
    fn check(address: u32, len: usize, direction: Direction) -> Result<AddressSpace> {
        let space = AddressSpace::classify_range(address, len)?;
        match (space, direction) {
            (AddressSpace::Descriptor, Direction::Read) | (AddressSpace::Framebuffer, Direction::Write) => Ok(space),
            _ => Err(Error::AccessDenied { address, direction }),
        }
    }
}

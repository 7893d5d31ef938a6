use alloc::vec::Vec;
use core::fmt;
use crate::framer::BusTransfer;
use crate::pins::PinOutputs;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub cycle: u64,
    pub pins: PinOutputs,
    pub ui_in: u8,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}  {}  ui_in={:02X}", self.cycle, self.pins, self.ui_in)
    }
}

/// Cycle-by-cycle record of the bus, plus the transfers decoded from it.
#[derive(Debug, Clone, Default)]
pub struct BusTrace {
    cycles: Vec<TraceEntry>,
    transfers: Vec<BusTransfer>,
    limit: Option<usize>,
}

impl BusTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `limit` cycles and `limit` transfers.
    pub fn with_limit(limit: usize) -> Self {
        Self { limit: Some(limit), ..Self::default() }
    }

    pub fn record_cycle(&mut self, entry: TraceEntry) {
        if self.limit.map_or(true, |limit| self.cycles.len() < limit) {
            self.cycles.push(entry);
        }
    }

    pub fn record_transfer(&mut self, transfer: BusTransfer) {
        if self.limit.map_or(true, |limit| self.transfers.len() < limit) {
            self.transfers.push(transfer);
        }
    }

    pub fn cycles(&self) -> &[TraceEntry] {
        &self.cycles
    }

    pub fn transfers(&self) -> &[BusTransfer] {
        &self.transfers
    }
}

#![no_std]
extern crate alloc;

pub mod pins;
pub mod memory_map;
pub mod framer;
pub mod engine;
pub mod shapes;
pub mod rasterizer;
pub mod peripheral;
pub mod accelerator;

use crate::framer::{Direction, FramePhase};
use crate::pins::PinOutputs;

pub use accelerator::{Accelerator, RESET_HOLD_CYCLES};
pub use engine::{BusStats, MemoryEngine};
pub use framer::{BusFramer, BusTransfer, FrameDecoder};
pub use peripheral::{Peripheral, sim_memory::SimMemory, trace::BusTrace};
pub use rasterizer::{PassReport, RasterConfig, Rasterizer, ScanOrder};
pub use shapes::{BoundingBox, DescriptorImage, FetchPolicy, Rgb, ShapeDescriptor, ShapeType};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Observed pin state disagrees with the framing contract. Never retried.
    #[error("protocol violation on cycle {cycle} ({phase:?}): expected {expected}, observed {observed}")]
    ProtocolViolation {
        cycle: u64,
        phase: FramePhase,
        expected: &'static str,
        observed: PinOutputs,
    },
    #[error("address range ${address:06X}+{len} is outside the descriptor and framebuffer spaces")]
    OutOfRange { address: u32, len: usize },
    #[error("{direction:?} access to ${address:06X} is not permitted")]
    AccessDenied { address: u32, direction: Direction },
    #[error("{0} shapes do not fit in descriptor memory")]
    TooManyShapes(usize),
    #[error("accelerator is held in reset or not enabled")]
    NotReady,
}

use alloc::boxed::Box;
use log::warn;
use crate::framer::{Decoded, Direction, FrameDecoder};
use crate::memory_map::{pixel_offset, AddressSpace, FRAMEBUFFER_SIZE};
use crate::peripheral::trace::{BusTrace, TraceEntry};
use crate::peripheral::Peripheral;
use crate::pins::PinOutputs;
use crate::shapes::{DescriptorImage, Rgb};
use crate::Result;

/// Memory behind the bus: descriptor ROM at the bottom, framebuffer RAM at `$800000`.
#[derive(Debug, Clone)]
pub struct SimMemory {
    descriptors: DescriptorImage,
    // heap allocation, the framebuffer is too large to move around by value
    framebuffer: Box<[u8; FRAMEBUFFER_SIZE as usize]>,
    decoder: FrameDecoder,
    trace: Option<BusTrace>,
    // value on ui_in after the last read data cycle
    ui_in: u8,
}

impl SimMemory {
    pub fn new(descriptors: DescriptorImage) -> Self {
        Self {
            descriptors,
            framebuffer: Box::new([0; FRAMEBUFFER_SIZE as usize]),
            decoder: FrameDecoder::new(),
            trace: None,
            ui_in: 0,
        }
    }

    pub fn with_trace(mut self, trace: BusTrace) -> Self {
        self.set_trace(trace);
        self
    }

    pub fn set_trace(&mut self, trace: BusTrace) {
        self.trace = Some(trace);
    }

    pub fn trace(&self) -> Option<&BusTrace> {
        self.trace.as_ref()
    }

    pub fn take_trace(&mut self) -> Option<BusTrace> {
        self.trace.take()
    }

    pub fn descriptors(&self) -> &DescriptorImage {
        &self.descriptors
    }

    /// Replaces descriptor memory. Only meaningful between passes.
    pub fn load_descriptors(&mut self, descriptors: DescriptorImage) {
        self.descriptors = descriptors;
    }

    pub fn framebuffer(&self) -> &[u8] {
        &self.framebuffer[..]
    }

    pub fn clear_framebuffer(&mut self, fill: u8) {
        self.framebuffer.fill(fill);
    }

    /// Peeks a pixel straight out of RAM, bypassing the bus.
    pub fn pixel(&self, x: u8, y: u8) -> Rgb {
        let offset = pixel_offset(x, y) as usize;
        let mut rgb = [0u8; 3];
        rgb.copy_from_slice(&self.framebuffer[offset..offset + 3]);
        rgb.into()
    }

    pub fn cycles(&self) -> u64 {
        self.decoder.cycle()
    }

    fn read_byte(&self, address: u32) -> u8 {
        match AddressSpace::classify(address) {
            Some(space @ AddressSpace::Descriptor) => {
                self.descriptors.as_bytes().get(space.offset(address)).copied().unwrap_or(0)
            }
            Some(space @ AddressSpace::Framebuffer) => self.framebuffer[space.offset(address)],
            None => {
                warn!("Attempted to read unmapped memory at: ${:06X}", address);
                0
            }
        }
    }

    fn write_byte(&mut self, address: u32, data: u8) {
        match AddressSpace::classify(address) {
            Some(space @ AddressSpace::Framebuffer) => {
                self.framebuffer[space.offset(address)] = data;
            }
            _ => {
                warn!("Attempted to write read-only memory at: ${:06X}", address);
            }
        }
    }
}

impl Peripheral for SimMemory {
    fn clock(&mut self, pins: &PinOutputs) -> Result<u8> {
        let cycle = self.decoder.cycle();
        let decoded = self.decoder.clock(pins)?;

        if let Decoded::Transfer(transfer) = decoded {
            match transfer.direction {
                Direction::Read => self.ui_in = self.read_byte(transfer.address),
                Direction::Write => self.write_byte(transfer.address, transfer.data),
            }
            if let Some(trace) = &mut self.trace {
                trace.record_transfer(transfer);
            }
        }

        if let Some(trace) = &mut self.trace {
            trace.record_cycle(TraceEntry { cycle, pins: *pins, ui_in: self.ui_in });
        }

        Ok(self.ui_in)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::{BusFramer, BusTransfer};
    use crate::memory_map::{framebuffer_address, FRAMEBUFFER_BASE};
    use crate::shapes::{BoundingBox, ShapeDescriptor};
    use crate::Error;

    fn memory() -> SimMemory {
        let shape = ShapeDescriptor::rectangle(BoundingBox::new(32, 96, 32, 96), Rgb::new(10, 20, 30));
        SimMemory::new(DescriptorImage::from_shapes(&[shape]).unwrap())
    }

    #[test]
    fn serves_descriptor_reads() {
        let mut mem = memory();
        assert_eq!(BusFramer::transfer(&mut mem, BusTransfer::read(0)).unwrap(), 1);
        assert_eq!(BusFramer::transfer(&mut mem, BusTransfer::read(2)).unwrap(), 96);
        assert_eq!(BusFramer::transfer(&mut mem, BusTransfer::read(6)).unwrap(), 20);
        // past the end of the image
        assert_eq!(BusFramer::transfer(&mut mem, BusTransfer::read(500)).unwrap(), 0);
        assert_eq!(mem.cycles(), 12);
    }

    #[test]
    fn stores_framebuffer_writes() {
        let mut mem = memory();
        for (channel, value) in [7u8, 8, 9].into_iter().enumerate() {
            let address = framebuffer_address(5, 3, channel as u8);
            BusFramer::transfer(&mut mem, BusTransfer::write(address, value)).unwrap();
        }
        assert_eq!(mem.pixel(5, 3), Rgb::new(7, 8, 9));
        assert_eq!(mem.pixel(4, 3), Rgb::BLACK);
    }

    #[test]
    fn ignores_descriptor_writes() {
        let mut mem = memory();
        BusFramer::transfer(&mut mem, BusTransfer::write(0, 0x55)).unwrap();
        assert_eq!(mem.descriptors().count(), 1);
    }

    #[test]
    fn traces_cycles_and_transfers() {
        let mut mem = memory().with_trace(BusTrace::new());
        mem.clock(&PinOutputs::IDLE).unwrap();
        BusFramer::transfer(&mut mem, BusTransfer::write(FRAMEBUFFER_BASE, 1)).unwrap();

        let trace = mem.trace().unwrap();
        assert_eq!(trace.cycles().len(), 4);
        assert_eq!(trace.cycles()[1].pins, PinOutputs::driven(0x00, 0x00));
        assert_eq!(trace.cycles()[2].pins, PinOutputs::driven(0x80, 0xFF));
        assert_eq!(trace.transfers(), &[BusTransfer::write(FRAMEBUFFER_BASE, 1)]);
    }

    #[test]
    fn surfaces_protocol_violations() {
        let mut mem = memory();
        mem.clock(&PinOutputs::driven(0, 0)).unwrap();
        let err = mem.clock(&PinOutputs::driven(0, 0x42)).unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation { cycle: 1, .. }));
    }
}

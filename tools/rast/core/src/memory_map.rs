//! Layout of the two address spaces reachable over the bus.
//!
//! ```text
//! $000000          shape count
//! $000001..        shape slots, 26 bytes each
//! $800000..$80BFFF framebuffer, row-major, R G B per pixel
//! ```

use crate::{Error, Result};

pub const CANVAS_WIDTH: u32 = 128;
pub const CANVAS_HEIGHT: u32 = 128;
pub const BYTES_PER_PIXEL: u32 = 3;

pub const ADDRESS_MASK: u32 = 0x00FF_FFFF;

pub const SHAPE_COUNT_ADDRESS: u32 = 0;
pub const SHAPE_SLOT_SIZE: u32 = 26;
pub const MAX_SHAPES: usize = 255;
pub const DESCRIPTOR_SIZE: u32 = 1 + SHAPE_SLOT_SIZE * MAX_SHAPES as u32;

pub const FRAMEBUFFER_BASE: u32 = 1 << 23;
pub const FRAMEBUFFER_SIZE: u32 = CANVAS_WIDTH * CANVAS_HEIGHT * BYTES_PER_PIXEL;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddressSpace {
    Descriptor,
    Framebuffer,
}

impl AddressSpace {
    pub fn classify(address: u32) -> Option<AddressSpace> {
        match address {
            0..DESCRIPTOR_SIZE => Some(AddressSpace::Descriptor),
            FRAMEBUFFER_BASE..=ADDRESS_MASK if address - FRAMEBUFFER_BASE < FRAMEBUFFER_SIZE => {
                Some(AddressSpace::Framebuffer)
            }
            _ => None,
        }
    }

    /// The space holding every byte of `address..address + len`. Ranges that leave the
    /// 24-bit bus, straddle a boundary or touch unmapped addresses are rejected.
    pub fn classify_range(address: u32, len: usize) -> Result<AddressSpace> {
        let out_of_range = Error::OutOfRange { address, len };
        let last = u32::try_from(len.max(1) - 1)
            .ok()
            .and_then(|span| address.checked_add(span))
            .ok_or(out_of_range.clone())?;

        match (Self::classify(address), Self::classify(last)) {
            (Some(first), Some(end)) if first == end => Ok(first),
            _ => Err(out_of_range),
        }
    }

    /// Offset of `address` within its space.
    pub fn offset(self, address: u32) -> usize {
        match self {
            AddressSpace::Descriptor => address as usize,
            AddressSpace::Framebuffer => (address - FRAMEBUFFER_BASE) as usize,
        }
    }
}

#[inline(always)]
pub fn pixel_offset(x: u8, y: u8) -> u32 {
    (CANVAS_WIDTH * y as u32 + x as u32) * BYTES_PER_PIXEL
}

/// Bus address of one color channel (0 = R, 1 = G, 2 = B) of pixel `(x, y)`.
#[inline(always)]
pub fn framebuffer_address(x: u8, y: u8, channel: u8) -> u32 {
    FRAMEBUFFER_BASE + pixel_offset(x, y) + channel as u32
}

#[inline(always)]
pub fn shape_slot_address(index: u8) -> u32 {
    SHAPE_COUNT_ADDRESS + 1 + SHAPE_SLOT_SIZE * index as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framebuffer_addresses() {
        assert_eq!(framebuffer_address(0, 0, 0), 0x80_0000);
        assert_eq!(framebuffer_address(1, 0, 2), 0x80_0005);
        assert_eq!(framebuffer_address(64, 64, 0), FRAMEBUFFER_BASE + (128 * 64 + 64) * 3);
        assert_eq!(framebuffer_address(127, 127, 2), FRAMEBUFFER_BASE + FRAMEBUFFER_SIZE - 1);
    }

    #[test]
    fn slot_addresses() {
        assert_eq!(shape_slot_address(0), 1);
        assert_eq!(shape_slot_address(1), 27);
        assert_eq!(shape_slot_address(254) + SHAPE_SLOT_SIZE, DESCRIPTOR_SIZE);
    }

    #[test]
    fn classify_spaces() {
        assert_eq!(AddressSpace::classify(0), Some(AddressSpace::Descriptor));
        assert_eq!(AddressSpace::classify(DESCRIPTOR_SIZE), None);
        assert_eq!(AddressSpace::classify(FRAMEBUFFER_BASE - 1), None);
        assert_eq!(AddressSpace::classify(FRAMEBUFFER_BASE), Some(AddressSpace::Framebuffer));
        assert_eq!(AddressSpace::classify(FRAMEBUFFER_BASE + FRAMEBUFFER_SIZE), None);
        assert_eq!(AddressSpace::classify(0x0100_0000), None);
    }

    #[test]
    fn ranges_must_stay_in_one_space() {
        assert_eq!(AddressSpace::classify_range(1, 4), Ok(AddressSpace::Descriptor));
        assert_eq!(
            AddressSpace::classify_range(FRAMEBUFFER_BASE + FRAMEBUFFER_SIZE - 3, 3),
            Ok(AddressSpace::Framebuffer)
        );
        assert_eq!(
            AddressSpace::classify_range(FRAMEBUFFER_BASE + FRAMEBUFFER_SIZE - 2, 3),
            Err(Error::OutOfRange { address: FRAMEBUFFER_BASE + FRAMEBUFFER_SIZE - 2, len: 3 })
        );
        assert!(AddressSpace::classify_range(DESCRIPTOR_SIZE - 1, 2).is_err());
        assert!(AddressSpace::classify_range(u32::MAX, 2).is_err());
    }
}

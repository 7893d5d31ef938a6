use alloc::vec;
use alloc::vec::Vec;
use bytemuck::{bytes_of, Pod, Zeroable};
use log::{debug, warn};
use crate::engine::MemoryEngine;
use crate::memory_map::{shape_slot_address, DESCRIPTOR_SIZE, MAX_SHAPES, SHAPE_COUNT_ADDRESS, SHAPE_SLOT_SIZE};
use crate::peripheral::Peripheral;
use crate::{Error, Result};

pub const BOUNDS_OFFSET: u32 = 0;
pub const COLOR_OFFSET: u32 = 4;
pub const KIND_OFFSET: u32 = 7;
pub const HEADER_SIZE: usize = 8;
pub const RESERVED_SIZE: usize = SHAPE_SLOT_SIZE as usize - HEADER_SIZE;

/// The meaningful prefix of a shape slot. The remaining bytes are reserved.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DescriptorHeader {
    /// x_min, x_max, y_min, y_max
    pub bounds: [u8; 4],
    pub color: [u8; 3],
    pub kind: u8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShapeType {
    Rectangle,
    Reserved(u8),
}

impl From<u8> for ShapeType {
    fn from(tag: u8) -> Self {
        match tag {
            0 => ShapeType::Rectangle,
            other => ShapeType::Reserved(other),
        }
    }
}

impl From<ShapeType> for u8 {
    fn from(kind: ShapeType) -> Self {
        match kind {
            ShapeType::Rectangle => 0,
            ShapeType::Reserved(tag) => tag,
        }
    }
}

/// Axis-aligned box, inclusive on all four edges.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BoundingBox {
    pub x_min: u8,
    pub x_max: u8,
    pub y_min: u8,
    pub y_max: u8,
}

impl BoundingBox {
    pub const fn new(x_min: u8, x_max: u8, y_min: u8, y_max: u8) -> Self {
        Self { x_min, x_max, y_min, y_max }
    }

    #[inline(always)]
    pub fn contains(&self, x: u8, y: u8) -> bool {
        (self.x_min..=self.x_max).contains(&x) && (self.y_min..=self.y_max).contains(&y)
    }
}

impl From<[u8; 4]> for BoundingBox {
    fn from(raw: [u8; 4]) -> Self {
        let [x_min, x_max, y_min, y_max] = raw;
        Self { x_min, x_max, y_min, y_max }
    }
}

impl From<BoundingBox> for [u8; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x_min, b.x_max, b.y_min, b.y_max]
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels in framebuffer order.
    pub const fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ShapeDescriptor {
    pub bounds: BoundingBox,
    pub color: Rgb,
    pub kind: ShapeType,
}

impl ShapeDescriptor {
    pub const fn rectangle(bounds: BoundingBox, color: Rgb) -> Self {
        Self { bounds, color, kind: ShapeType::Rectangle }
    }

    pub fn header(&self) -> DescriptorHeader {
        DescriptorHeader {
            bounds: self.bounds.into(),
            color: self.color.to_bytes(),
            kind: self.kind.into(),
        }
    }
}

impl From<DescriptorHeader> for ShapeDescriptor {
    fn from(header: DescriptorHeader) -> Self {
        Self {
            bounds: header.bounds.into(),
            color: header.color.into(),
            kind: header.kind.into(),
        }
    }
}

/// Contents of descriptor space: the count byte followed by the shape slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorImage {
    bytes: Vec<u8>,
}

impl DescriptorImage {
    pub fn from_shapes(shapes: &[ShapeDescriptor]) -> Result<Self> {
        if shapes.len() > MAX_SHAPES {
            return Err(Error::TooManyShapes(shapes.len()));
        }

        let mut bytes = vec![0u8; 1 + SHAPE_SLOT_SIZE as usize * shapes.len()];
        bytes[SHAPE_COUNT_ADDRESS as usize] = shapes.len() as u8;
        for (index, shape) in shapes.iter().enumerate() {
            let start = shape_slot_address(index as u8) as usize;
            bytes[start..start + HEADER_SIZE].copy_from_slice(bytes_of(&shape.header()));
        }

        Ok(Self { bytes })
    }

    /// Wraps a raw image. Missing bytes read back as zero.
    pub fn from_bytes(mut bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() > DESCRIPTOR_SIZE as usize {
            return Err(Error::OutOfRange { address: SHAPE_COUNT_ADDRESS, len: bytes.len() });
        }
        if bytes.is_empty() {
            bytes.push(0);
        }
        Ok(Self { bytes })
    }

    pub fn count(&self) -> u8 {
        self.bytes[SHAPE_COUNT_ADDRESS as usize]
    }

    /// Overwrites the count byte without touching the slots.
    pub fn set_count(&mut self, count: u8) {
        self.bytes[SHAPE_COUNT_ADDRESS as usize] = count;
    }

    pub fn header(&self, index: u8) -> DescriptorHeader {
        let start = shape_slot_address(index) as usize;
        let mut raw = [0u8; HEADER_SIZE];
        for (offset, byte) in raw.iter_mut().enumerate() {
            *byte = self.bytes.get(start + offset).copied().unwrap_or(0);
        }
        bytemuck::cast(raw)
    }

    /// The shapes the count byte declares valid.
    pub fn shapes(&self) -> impl Iterator<Item = ShapeDescriptor> + '_ {
        (0..self.count()).map(|index| self.header(index).into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// How often shape fields are fetched from descriptor space.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum FetchPolicy {
    /// Re-read each candidate's bounding box, and its color on a hit, for every pixel.
    #[default]
    PerPixel,
    /// Read every slot header once after the count and serve the pass from it.
    PerPass,
}

/// The ordered shape list as seen from the accelerator side of the bus.
#[derive(Debug, Clone)]
pub struct ShapeModel {
    policy: FetchPolicy,
    count: u8,
    // empty when type tags were not probed; every shape then counts as a rectangle
    rectangles: heapless::Vec<bool, MAX_SHAPES>,
    cache: heapless::Vec<ShapeDescriptor, MAX_SHAPES>,
}

impl ShapeModel {
    pub fn new(policy: FetchPolicy) -> Self {
        Self {
            policy,
            count: 0,
            rectangles: heapless::Vec::new(),
            cache: heapless::Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.count = 0;
        self.rectangles.clear();
        self.cache.clear();
    }

    /// Pass prologue: reads the count, then slot headers or type tags as the policy requires.
    pub fn load<P: Peripheral>(&mut self, engine: &mut MemoryEngine<P>, check_types: bool) -> Result<u8> {
        self.clear();
        self.count = Self::fetch_count(engine)?;

        for index in 0..self.count {
            let kind = match self.policy {
                FetchPolicy::PerPass => {
                    let shape = Self::fetch_shape(engine, index)?;
                    // the count is a single byte, so the table cannot overflow
                    let pushed = self.cache.push(shape);
                    debug_assert!(pushed.is_ok(), "shape cache overflow at {}", index);
                    shape.kind
                }
                FetchPolicy::PerPixel if check_types => Self::fetch_kind(engine, index)?,
                FetchPolicy::PerPixel => continue,
            };

            if check_types {
                if let ShapeType::Reserved(tag) = kind {
                    warn!("shape {} has unsupported type {}, it will never match", index, tag);
                }
                let pushed = self.rectangles.push(kind == ShapeType::Rectangle);
                debug_assert!(pushed.is_ok(), "shape type table overflow at {}", index);
            }
        }

        debug!(target: "shapes", "loaded {} shapes ({:?})", self.count, self.policy);
        Ok(self.count)
    }

    pub fn shape_count(&self) -> u8 {
        self.count
    }

    /// Whether shape `index` takes part in hit testing.
    pub fn is_candidate(&self, index: u8) -> bool {
        self.rectangles.get(index as usize).copied().unwrap_or(true)
    }

    pub fn bounds<P: Peripheral>(&self, engine: &mut MemoryEngine<P>, index: u8) -> Result<BoundingBox> {
        if let Some(shape) = self.cache.get(index as usize) {
            return Ok(shape.bounds);
        }
        let mut raw = [0u8; 4];
        engine.read_into(shape_slot_address(index) + BOUNDS_OFFSET, &mut raw)?;
        Ok(raw.into())
    }

    pub fn color<P: Peripheral>(&self, engine: &mut MemoryEngine<P>, index: u8) -> Result<Rgb> {
        if let Some(shape) = self.cache.get(index as usize) {
            return Ok(shape.color);
        }
        let mut raw = [0u8; 3];
        engine.read_into(shape_slot_address(index) + COLOR_OFFSET, &mut raw)?;
        Ok(raw.into())
    }

    pub fn fetch_count<P: Peripheral>(engine: &mut MemoryEngine<P>) -> Result<u8> {
        let mut count = [0u8];
        engine.read_into(SHAPE_COUNT_ADDRESS, &mut count)?;
        Ok(count[0])
    }

    pub fn fetch_shape<P: Peripheral>(engine: &mut MemoryEngine<P>, index: u8) -> Result<ShapeDescriptor> {
        let mut raw = [0u8; HEADER_SIZE];
        engine.read_into(shape_slot_address(index), &mut raw)?;
        Ok(bytemuck::cast::<_, DescriptorHeader>(raw).into())
    }

    pub fn fetch_kind<P: Peripheral>(engine: &mut MemoryEngine<P>, index: u8) -> Result<ShapeType> {
        let mut tag = [0u8];
        engine.read_into(shape_slot_address(index) + KIND_OFFSET, &mut tag)?;
        Ok(tag[0].into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        let b = BoundingBox::new(32, 96, 32, 96);
        assert!(b.contains(32, 32));
        assert!(b.contains(96, 96));
        assert!(b.contains(64, 40));
        assert!(!b.contains(31, 64));
        assert!(!b.contains(64, 97));
    }

    #[test]
    fn header_layout() {
        let shape = ShapeDescriptor::rectangle(BoundingBox::new(1, 2, 3, 4), Rgb::new(5, 6, 7));
        assert_eq!(bytes_of(&shape.header()), &[1, 2, 3, 4, 5, 6, 7, 0]);
        assert_eq!(core::mem::size_of::<DescriptorHeader>(), HEADER_SIZE);
        assert_eq!(RESERVED_SIZE, 18);
    }

    #[test]
    fn image_places_slots() {
        let shapes = [
            ShapeDescriptor::rectangle(BoundingBox::new(32, 96, 32, 96), Rgb::WHITE),
            ShapeDescriptor {
                bounds: BoundingBox::new(0, 1, 2, 3),
                color: Rgb::new(9, 8, 7),
                kind: ShapeType::Reserved(4),
            },
        ];
        let image = DescriptorImage::from_shapes(&shapes).unwrap();
        let bytes = image.as_bytes();

        assert_eq!(bytes.len(), 1 + 2 * 26);
        assert_eq!(bytes[0], 2);
        assert_eq!(&bytes[1..9], &[32, 96, 32, 96, 255, 255, 255, 0]);
        assert_eq!(&bytes[27..35], &[0, 1, 2, 3, 9, 8, 7, 4]);
        assert!(bytes[9..27].iter().all(|&b| b == 0));

        let decoded: Vec<_> = image.shapes().collect();
        assert_eq!(decoded, shapes);
    }

    #[test]
    fn image_reads_missing_slots_as_zero() {
        let mut image = DescriptorImage::from_bytes(vec![]).unwrap();
        assert_eq!(image.count(), 0);
        image.set_count(2);
        assert_eq!(image.header(1), DescriptorHeader::default());
        assert_eq!(image.shapes().count(), 2);
    }

    #[test]
    fn too_many_shapes() {
        let shapes = vec![ShapeDescriptor::rectangle(BoundingBox::default(), Rgb::BLACK); 256];
        assert_eq!(DescriptorImage::from_shapes(&shapes), Err(Error::TooManyShapes(256)));
        assert!(DescriptorImage::from_shapes(&shapes[..255]).is_ok());
        assert!(DescriptorImage::from_bytes(vec![0; DESCRIPTOR_SIZE as usize + 1]).is_err());
    }

    #[test]
    fn load_fills_every_slot() {
        let shapes = vec![ShapeDescriptor::rectangle(BoundingBox::new(0, 1, 0, 1), Rgb::WHITE); MAX_SHAPES];
        let image = DescriptorImage::from_shapes(&shapes).unwrap();
        let mut engine = MemoryEngine::new(crate::SimMemory::new(image));

        for policy in [FetchPolicy::PerPass, FetchPolicy::PerPixel] {
            let mut model = ShapeModel::new(policy);
            assert_eq!(model.load(&mut engine, true).unwrap(), 255);
            assert!(model.is_candidate(254));
            assert_eq!(model.bounds(&mut engine, 254).unwrap(), BoundingBox::new(0, 1, 0, 1));
        }
    }

    #[test]
    fn shape_type_tags() {
        assert_eq!(ShapeType::from(0), ShapeType::Rectangle);
        assert_eq!(ShapeType::from(3), ShapeType::Reserved(3));
        assert_eq!(u8::from(ShapeType::Reserved(3)), 3);
    }
}

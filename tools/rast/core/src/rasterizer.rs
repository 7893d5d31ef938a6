use alloc::vec;
use alloc::vec::Vec;
use log::{debug, trace};
use crate::engine::{BusStats, MemoryEngine, DEFAULT_TURNAROUND_CYCLES};
use crate::memory_map::{framebuffer_address, CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::peripheral::Peripheral;
use crate::shapes::{FetchPolicy, Rgb, ShapeModel};
use crate::Result;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ScanOrder {
    /// y outer, x inner
    #[default]
    RowMajor,
    /// x outer, y inner
    ColumnMajor,
}

impl ScanOrder {
    /// Every canvas coordinate as `(x, y)`, in scan order.
    pub fn pixels(self) -> impl Iterator<Item = (u8, u8)> {
        let (outer, inner) = match self {
            ScanOrder::RowMajor => (CANVAS_HEIGHT, CANVAS_WIDTH),
            ScanOrder::ColumnMajor => (CANVAS_WIDTH, CANVAS_HEIGHT),
        };
        (0..outer).flat_map(move |a| {
            (0..inner).map(move |b| match self {
                ScanOrder::RowMajor => (b as u8, a as u8),
                ScanOrder::ColumnMajor => (a as u8, b as u8),
            })
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RasterConfig {
    pub scan_order: ScanOrder,
    pub fetch_policy: FetchPolicy,
    /// Idle cycles before each request group.
    pub turnaround_cycles: u8,
    /// Probe type tags after the count and skip shapes that are not rectangles.
    pub check_shape_types: bool,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            scan_order: ScanOrder::RowMajor,
            fetch_policy: FetchPolicy::PerPixel,
            turnaround_cycles: DEFAULT_TURNAROUND_CYCLES,
            check_shape_types: true,
        }
    }
}

/// Per-pixel states, logged at trace level.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PixelState {
    ReadBox,
    CheckHit,
    ReadColor,
    WriteColor,
    WriteBackground,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub shape_count: u8,
    pub pixels: u32,
    pub background_pixels: u32,
    /// Pixels won by each shape, indexed by shape.
    pub hits_per_shape: Vec<u32>,
    pub stats: BusStats,
}

/// Walks the canvas, hit-tests each pixel against the shape list in ascending index
/// order and writes the winning color (or black) to the framebuffer.
#[derive(Debug, Clone)]
pub struct Rasterizer {
    config: RasterConfig,
    shapes: ShapeModel,
}

impl Rasterizer {
    pub fn new(config: RasterConfig) -> Self {
        Self {
            config,
            shapes: ShapeModel::new(config.fetch_policy),
        }
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    /// Drops anything cached by a previous pass.
    pub fn reset(&mut self) {
        self.shapes.clear();
    }

    pub fn render_pass<P: Peripheral>(&mut self, engine: &mut MemoryEngine<P>) -> Result<PassReport> {
        let start = engine.stats();
        engine.set_turnaround(self.config.turnaround_cycles);

        let shape_count = self.shapes.load(engine, self.config.check_shape_types)?;
        debug!("starting pass over {} shapes, {:?}", shape_count, self.config);

        let mut report = PassReport {
            shape_count,
            hits_per_shape: vec![0; shape_count as usize],
            ..PassReport::default()
        };

        for (x, y) in self.config.scan_order.pixels() {
            let (color, winner) = self.resolve_pixel(engine, x, y)?;

            match winner {
                Some(index) => {
                    trace!(target: "raster", "({}, {}) {:?} shape {}", x, y, PixelState::WriteColor, index);
                    report.hits_per_shape[index as usize] += 1;
                }
                None => {
                    trace!(target: "raster", "({}, {}) {:?}", x, y, PixelState::WriteBackground);
                    report.background_pixels += 1;
                }
            }

            engine.write(framebuffer_address(x, y, 0), &color.to_bytes())?;
            report.pixels += 1;
        }

        report.stats = engine.stats().since(&start);
        debug!(
            "pass complete, {} pixels, {} background, {} bus cycles",
            report.pixels, report.background_pixels, report.stats.cycles
        );
        Ok(report)
    }

    /// First shape whose box contains the pixel wins; later shapes are not consulted.
    fn resolve_pixel<P: Peripheral>(&self, engine: &mut MemoryEngine<P>, x: u8, y: u8) -> Result<(Rgb, Option<u8>)> {
        for index in 0..self.shapes.shape_count() {
            if !self.shapes.is_candidate(index) {
                continue;
            }

            trace!(target: "raster", "({}, {}) {:?} shape {}", x, y, PixelState::ReadBox, index);
            let bounds = self.shapes.bounds(engine, index)?;

            trace!(target: "raster", "({}, {}) {:?} {:?}", x, y, PixelState::CheckHit, bounds);
            if bounds.contains(x, y) {
                trace!(target: "raster", "({}, {}) {:?} shape {}", x, y, PixelState::ReadColor, index);
                let color = self.shapes.color(engine, index)?;
                return Ok((color, Some(index)));
            }
        }

        Ok((Rgb::BLACK, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_scan() {
        let pixels: Vec<_> = ScanOrder::RowMajor.pixels().take(130).collect();
        assert_eq!(pixels[0], (0, 0));
        assert_eq!(pixels[1], (1, 0));
        assert_eq!(pixels[127], (127, 0));
        assert_eq!(pixels[128], (0, 1));
        assert_eq!(ScanOrder::RowMajor.pixels().count(), 128 * 128);
    }

    #[test]
    fn column_major_scan() {
        let pixels: Vec<_> = ScanOrder::ColumnMajor.pixels().take(130).collect();
        assert_eq!(pixels[1], (0, 1));
        assert_eq!(pixels[128], (1, 0));
        assert_eq!(ScanOrder::ColumnMajor.pixels().last(), Some((127, 127)));
    }

    #[test]
    fn default_config() {
        let config = RasterConfig::default();
        assert_eq!(config.scan_order, ScanOrder::RowMajor);
        assert_eq!(config.fetch_policy, FetchPolicy::PerPixel);
        assert_eq!(config.turnaround_cycles, 1);
        assert!(config.check_shape_types);
    }
}

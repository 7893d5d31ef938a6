use log::{debug, info};
use crate::engine::MemoryEngine;
use crate::peripheral::Peripheral;
use crate::pins::ControlPins;
use crate::rasterizer::{PassReport, RasterConfig, Rasterizer};
use crate::{Error, Result};

/// Cycles `rst_n` is held low by `power_on`.
pub const RESET_HOLD_CYCLES: u32 = 10;

/// Top level of the device: control pins, the memory engine and the rasterizer.
#[derive(Debug)]
pub struct Accelerator<P: Peripheral> {
    engine: MemoryEngine<P>,
    rasterizer: Rasterizer,
    control: ControlPins,
    passes: u32,
}

impl<P: Peripheral> Accelerator<P> {
    pub fn new(peripheral: P, config: RasterConfig) -> Self {
        Self {
            engine: MemoryEngine::new(peripheral),
            rasterizer: Rasterizer::new(config),
            control: ControlPins::power_on(),
            passes: 0,
        }
    }

    /// Enables the device and runs the reset sequence.
    pub fn power_on(&mut self) -> Result<()> {
        self.set_enable(true);
        self.hold_reset(RESET_HOLD_CYCLES)?;
        self.release_reset();
        Ok(())
    }

    /// Asserts reset for `cycles` clock cycles. Registers clear while it is held.
    pub fn hold_reset(&mut self, cycles: u32) -> Result<()> {
        self.control.set_rst_n(false);
        self.rasterizer.reset();
        self.engine.idle(cycles)?;
        self.engine.reset_stats();
        self.passes = 0;
        debug!("reset held for {} cycles", cycles);
        Ok(())
    }

    pub fn release_reset(&mut self) {
        self.control.set_rst_n(true);
    }

    pub fn set_enable(&mut self, enable: bool) {
        self.control.set_ena(enable);
    }

    pub fn control(&self) -> ControlPins {
        self.control
    }

    pub fn config(&self) -> &RasterConfig {
        self.rasterizer.config()
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    pub fn engine(&self) -> &MemoryEngine<P> {
        &self.engine
    }

    pub fn peripheral(&self) -> &P {
        self.engine.peripheral()
    }

    pub fn peripheral_mut(&mut self) -> &mut P {
        self.engine.peripheral_mut()
    }

    pub fn into_peripheral(self) -> P {
        self.engine.into_peripheral()
    }

    /// Renders the whole canvas once. Fails without touching the bus while in reset or disabled.
    pub fn render_pass(&mut self) -> Result<PassReport> {
        if !self.control.is_running() {
            return Err(Error::NotReady);
        }

        let report = self.rasterizer.render_pass(&mut self.engine)?;
        self.passes += 1;
        info!(
            "pass {} rendered {} shapes in {} cycles ({} reads, {} writes)",
            self.passes, report.shape_count, report.stats.cycles, report.stats.reads, report.stats.writes
        );
        Ok(report)
    }
}

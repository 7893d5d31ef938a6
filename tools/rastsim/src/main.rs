mod scene;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rast_core::framer::Direction;
use rast_core::memory_map::{CANVAS_HEIGHT, CANVAS_WIDTH};
use rast_core::{Accelerator, BusTrace, PassReport, Rgb, SimMemory};
use tracing::{info, warn, Level};
use tracing_subscriber::util::SubscriberInitExt;

use crate::scene::{Fetch, Scan, Scene, SceneConfig};

#[derive(Parser)]
#[command(name = "rastsim")]
#[command(version, about = "Shape rasterizer bus simulator", long_about = None)]
struct Cli {
    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Default)]
struct ConfigArgs {
    /// Raster scan order
    #[arg(long, value_enum)]
    scan: Option<Scan>,

    /// How often shape descriptors are fetched
    #[arg(long, value_enum)]
    fetch: Option<Fetch>,

    /// Idle cycles before each request group
    #[arg(long)]
    turnaround: Option<u8>,

    /// Treat every shape as a rectangle and skip the type tag reads
    #[arg(long)]
    no_type_check: bool,
}

impl ConfigArgs {
    fn overrides(&self) -> SceneConfig {
        SceneConfig {
            scan: self.scan,
            fetch: self.fetch,
            turnaround: self.turnaround,
            check_shape_types: self.no_type_check.then_some(false),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render a scene and report what the bus did
    Render {
        /// Scene description (JSON)
        scene: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,

        /// Run this many passes and check that they produce the same framebuffer
        #[arg(long, default_value_t = 1)]
        passes: u32,

        /// Print the color of a pixel after rendering, as x,y
        #[arg(long, value_parser = parse_point)]
        probe: Vec<(u8, u8)>,
    },

    /// Print the first bus cycles of a pass
    Trace {
        scene: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,

        /// Number of cycles to print
        #[arg(short, long, default_value_t = 64)]
        limit: usize,
    },

    /// Write the raw descriptor memory image of a scene
    Image {
        scene: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Framebuffer fill between passes. Must differ from every channel of the background.
const STALE_FILL: u8 = 0xAA;

fn parse_point(text: &str) -> Result<(u8, u8), String> {
    let (x, y) = text.split_once(',').ok_or_else(|| format!("expected x,y, got '{}'", text))?;
    let coord = |s: &str, limit: u32| -> Result<u8, String> {
        let v: u32 = s.trim().parse().map_err(|e| format!("bad coordinate '{}': {}", s, e))?;
        if v >= limit {
            return Err(format!("coordinate {} is off the canvas", v));
        }
        Ok(v as u8)
    };
    Ok((coord(x, CANVAS_WIDTH)?, coord(y, CANVAS_HEIGHT)?))
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .compact()
        .finish()
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Render { scene, config, passes, probe } => render(&scene, &config, passes, &probe).map(|_| ()),
        Commands::Trace { scene, config, limit } => trace(&scene, &config, limit).map(|_| ()),
        Commands::Image { scene, output } => {
            let image = Scene::load(&scene)?.image()?;
            fs::write(&output, image.as_bytes()).with_context(|| format!("failed to write {}", output.display()))?;
            println!("wrote {} bytes ({} shapes) to {}", image.as_bytes().len(), image.count(), output.display());
            Ok(())
        }
    }
}

fn build(scene: &Path, args: &ConfigArgs, trace: Option<BusTrace>) -> anyhow::Result<Accelerator<SimMemory>> {
    let scene = Scene::load(scene)?;
    let config = scene.config.merge(&args.overrides()).raster_config();

    let memory = SimMemory::new(scene.image()?);
    let mut accel = Accelerator::new(memory, config);
    info!("{} shapes, {:?}", scene.shapes.len(), accel.config());
    accel.power_on().context("reset sequence failed")?;
    if let Some(trace) = trace {
        accel.peripheral_mut().set_trace(trace);
    }
    Ok(accel)
}

fn refill(accel: &mut Accelerator<SimMemory>) {
    debug_assert!(Rgb::BLACK.to_bytes().iter().all(|&c| c != STALE_FILL));
    accel.peripheral_mut().clear_framebuffer(STALE_FILL);
}

/// Renders `passes` passes and returns the framebuffer checksum they all agree on.
fn render(scene: &Path, args: &ConfigArgs, passes: u32, probe: &[(u8, u8)]) -> anyhow::Result<u32> {
    if passes == 0 {
        bail!("--passes must be at least 1");
    }

    let mut accel = build(scene, args, None)?;
    let mut first_checksum = None;

    for pass in 1..=passes {
        if pass > 1 {
            refill(&mut accel);
        }
        let report = accel.render_pass().with_context(|| format!("pass {} failed", pass))?;
        let checksum = crc32fast::hash(accel.peripheral().framebuffer());

        print_report(pass, &report, checksum);

        match first_checksum {
            None => first_checksum = Some(checksum),
            Some(first) if first != checksum => {
                bail!("pass {} framebuffer {:08x} differs from pass 1 {:08x}", pass, checksum, first)
            }
            Some(_) => {}
        }
    }

    for &(x, y) in probe {
        let rgb = accel.peripheral().pixel(x, y);
        println!("({:>3}, {:>3}) = #{:02x}{:02x}{:02x}", x, y, rgb.r, rgb.g, rgb.b);
    }

    first_checksum.context("no pass was rendered")
}

fn print_report(pass: u32, report: &PassReport, checksum: u32) {
    println!("pass {}", pass);
    println!("  shapes      {}", report.shape_count);
    for (index, hits) in report.hits_per_shape.iter().enumerate() {
        if *hits == 0 {
            warn!("shape {} is not visible", index);
        }
        println!("    #{:<3}     {} px", index, hits);
    }
    println!("  background  {} px", report.background_pixels);
    println!(
        "  bus         {} cycles, {} idle, {} reads, {} writes",
        report.stats.cycles, report.stats.idle_cycles, report.stats.reads, report.stats.writes
    );
    println!("  crc32       {:08x}", checksum);
}

fn trace(scene: &Path, args: &ConfigArgs, limit: usize) -> anyhow::Result<BusTrace> {
    let mut accel = build(scene, args, Some(BusTrace::with_limit(limit)))?;
    accel.render_pass()?;

    let trace = accel.peripheral_mut().take_trace().context("bus trace was not recorded")?;
    println!("{:>8}  pins", "cycle");
    for entry in trace.cycles() {
        println!("{}", entry);
    }
    for transfer in trace.transfers() {
        match transfer.direction {
            Direction::Read => println!("read  ${:06X}", transfer.address),
            Direction::Write => println!("write ${:06X} {:02X}", transfer.address, transfer.data),
        }
    }
    Ok(trace)
}

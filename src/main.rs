//! Runner for the pose-driven particle field.
//!
//! Opens a window by default. `--headless-frames N` steps the simulation N
//! times without a window instead, on the GPU when an adapter exists and on
//! the host otherwise.

mod window;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use winit::event_loop::{ControlFlow, EventLoop};

use posefield::prelude::*;
use posefield::Texel;

/// Largest edge the host backend is asked to simulate.
const CPU_MAX_EDGE: u32 = 256;
/// Fixed step used by headless runs.
const HEADLESS_DELTA: f32 = 1.0 / 60.0;

#[derive(Parser, Debug)]
#[command(name = "posefield", version, about = "Pose-driven GPU particle field")]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Quality tier: small, medium, large, or an explicit edge length
    #[arg(short, long, value_parser = parse_quality)]
    quality: Option<Quality>,

    /// RNG seed for reproducible seeding
    #[arg(long)]
    seed: Option<u64>,

    /// Run this many frames without a window, then exit
    #[arg(long, value_name = "N")]
    headless_frames: Option<u64>,

    /// Use the host backend even when a GPU is available (headless only)
    #[arg(long)]
    cpu: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_quality(name: &str) -> Result<Quality, String> {
    Quality::from_name(name).ok_or_else(|| format!("unknown quality tier '{name}'"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(quality) = cli.quality {
        settings.quality = quality;
    }
    if let Some(seed) = cli.seed {
        settings.seed = Some(seed);
    }

    match cli.headless_frames {
        Some(frames) => run_headless(settings, frames, cli.cpu),
        None => {
            let event_loop = EventLoop::new()?;
            event_loop.set_control_flow(ControlFlow::Poll);
            let mut app = window::App::new(settings);
            event_loop.run_app(&mut app)?;
            app.into_result()
        }
    }
}

fn run_headless(settings: Settings, frames: u64, force_cpu: bool) -> Result<()> {
    if !force_cpu {
        match GpuBackend::headless() {
            Ok(backend) => {
                return drive(ParticleSimulation::new(backend).with_settings(&settings), frames)
            }
            Err(e) => log::warn!("no GPU available ({e}), falling back to the host backend"),
        }
    }

    let mut settings = settings;
    if settings.quality.edge() > CPU_MAX_EDGE {
        log::warn!(
            "{:?} is too large for the host backend, using {CPU_MAX_EDGE}x{CPU_MAX_EDGE}",
            settings.quality
        );
        settings.quality = Quality::Custom(CPU_MAX_EDGE);
    }
    drive(ParticleSimulation::new(CpuBackend::new()).with_settings(&settings), frames)
}

/// Step `frames` times on a fixed clock, cycling through every pose label
/// and a pulsing audio level, then log field statistics.
fn drive<B: SimBackend>(mut sim: ParticleSimulation<B>, frames: u64) -> Result<()> {
    sim.initialize().context("failed to initialize simulation")?;
    let mut clock = FrameClock::fixed(HEADLESS_DELTA);
    let mut resets = 0;

    for frame in 0..frames {
        let label = PoseLabel::ALL[(frame / 60) as usize % PoseLabel::ALL.len()];
        sim.label().set(label);
        sim.level().set(0.5 + 0.5 * (frame as f32 * 0.1).sin());

        let (elapsed, delta) = clock.tick();
        if let StepOutcome::Stepped(report) = sim.step(FrameInput::new(delta, elapsed))? {
            if report.reset.is_some() {
                resets += 1;
            }
        }
    }

    let positions = sim.read_positions()?;
    log_summary(&positions, sim.params().boundary_radius, sim.frame(), resets);
    sim.dispose();
    Ok(())
}

fn log_summary(positions: &[Texel], boundary_radius: f32, frames: u64, resets: u64) {
    if positions.is_empty() {
        return;
    }
    let radii: Vec<f32> = positions
        .iter()
        .map(|p| Vec3::new(p[0], p[1], p[2]).length())
        .collect();
    let mean = radii.iter().sum::<f32>() / radii.len() as f32;
    let max = radii.iter().copied().fold(0.0f32, f32::max);
    let outside = radii.iter().filter(|r| **r > boundary_radius).count();
    let non_finite = positions
        .iter()
        .filter(|p| p.iter().any(|c| !c.is_finite()))
        .count();

    log::info!(
        "{frames} frames, {resets} resets: {} particles, mean radius {mean:.3}, max radius {max:.3}, {outside} outside boundary",
        positions.len()
    );
    if non_finite > 0 {
        log::warn!("{non_finite} particles hold non-finite values");
    }
}

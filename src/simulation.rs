//! Simulation orchestrator.
//!
//! [`ParticleSimulation`] owns the seed fields and the two ping-pong pairs
//! (positions, velocities) on some [`SimBackend`], and sequences one frame:
//!
//! 1. apply a debounced quality change if its deadline has passed
//! 2. record the frame delta with the watchdog, reseeding on collapse
//! 3. snapshot parameters and inputs, derive the external force
//! 4. velocity pass, position pass, render feed, submit
//! 5. swap both pairs
//!
//! The state machine is `Uninitialized -> Running -> Disposed`; resets are
//! instantaneous transitions back into `Running`.
//!
//! ```ignore
//! let mut sim = ParticleSimulation::new(CpuBackend::new())
//!     .with_quality(Quality::Small)
//!     .with_seed(7);
//! sim.initialize()?;
//! sim.step(FrameInput::new(0.016, 0.016))?;
//! ```

use std::time::Duration;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::backend::{RenderFeed, SimBackend};
use crate::config::{Quality, SeedConfig, Settings, SimParams};
use crate::error::SimError;
use crate::kernels;
use crate::pingpong::PingPong;
use crate::seed::{SeedData, Texel};
use crate::signal::{LabelRef, LevelRef, PoseLabel};
use crate::uniforms::{PositionUniforms, VelocityUniforms};
use crate::watchdog::FrameWatchdog;

/// Lifecycle of a [`ParticleSimulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    Uninitialized,
    Running,
    Disposed,
}

/// Why the fields were reseeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// Requested by the owner.
    Manual,
    /// Frame-time collapse detected by the watchdog.
    Watchdog,
    /// Fields were reallocated for a new quality tier.
    QualityChange,
}

/// Timing for one step, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    /// Time since the previous step.
    pub delta: f32,
    /// Time since the simulation clock started; drives respawn hashing and
    /// the quality debounce.
    pub elapsed: f32,
}

impl FrameInput {
    pub fn new(delta: f32, elapsed: f32) -> Self {
        Self { delta, elapsed }
    }
}

/// Summary of one executed step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Step index, starting at 1.
    pub frame: u64,
    /// Set when the fields were reseeded before this step computed.
    pub reset: Option<ResetReason>,
    pub label: PoseLabel,
    pub force: Vec3,
    /// Clamped audio level used this step.
    pub audio_level: f32,
    /// Delta after clamping.
    pub delta: f32,
    pub quality: Quality,
}

/// Result of [`ParticleSimulation::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    Stepped(StepReport),
    /// Not running; nothing was recorded.
    Skipped,
}

impl StepOutcome {
    pub fn report(&self) -> Option<&StepReport> {
        match self {
            StepOutcome::Stepped(report) => Some(report),
            StepOutcome::Skipped => None,
        }
    }
}

/// Every device resource belonging to one quality tier.
#[derive(Debug)]
struct Fields<F> {
    quality: Quality,
    seed_positions: F,
    seed_velocities: F,
    positions: PingPong<F>,
    velocities: PingPong<F>,
}

#[derive(Debug, Clone, Copy)]
struct PendingQuality {
    quality: Quality,
    deadline: f32,
}

/// GPU particle simulation driven by a pose label and an audio level.
pub struct ParticleSimulation<B: SimBackend> {
    backend: B,
    state: SimState,
    quality: Quality,
    params: SimParams,
    seed_config: SeedConfig,
    force_strength: f32,
    quality_debounce: f32,
    label: LabelRef,
    level: LevelRef,
    rng: StdRng,
    fields: Option<Fields<B::Field>>,
    watchdog: FrameWatchdog,
    pending_quality: Option<PendingQuality>,
    /// Read halves have not been written by a step yet; read the seeds.
    first_frame: bool,
    frame: u64,
    resets: u64,
    /// Manual reset not yet reported by a step.
    unreported_reset: Option<ResetReason>,
    last_elapsed: f32,
    level_out_of_range: bool,
}

impl<B: SimBackend> ParticleSimulation<B> {
    /// Default external force magnitude.
    pub const DEFAULT_FORCE_STRENGTH: f32 = 30.0;
    /// Default delay before a requested quality change takes effect.
    pub const DEFAULT_QUALITY_DEBOUNCE: Duration = Duration::from_millis(500);

    /// Create an uninitialized simulation with default settings.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: SimState::Uninitialized,
            quality: Quality::default(),
            params: SimParams::default(),
            seed_config: SeedConfig::default(),
            force_strength: Self::DEFAULT_FORCE_STRENGTH,
            quality_debounce: Self::DEFAULT_QUALITY_DEBOUNCE.as_secs_f32(),
            label: LabelRef::default(),
            level: LevelRef::default(),
            rng: StdRng::from_entropy(),
            fields: None,
            watchdog: FrameWatchdog::default(),
            pending_quality: None,
            first_frame: true,
            frame: 0,
            resets: 0,
            unreported_reset: None,
            last_elapsed: 0.0,
            level_out_of_range: false,
        }
    }

    /// Apply everything a settings file configures.
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.quality = settings.quality;
        self.params = settings.params;
        self.seed_config = settings.seed_state;
        self.force_strength = settings.force_strength;
        self.quality_debounce = settings.quality_debounce().as_secs_f32();
        if let Some(seed) = settings.seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self
    }

    /// Set the initial quality tier.
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_params(mut self, params: SimParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_seed_config(mut self, config: SeedConfig) -> Self {
        self.seed_config = config;
        self
    }

    /// Make seeding reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_force_strength(mut self, strength: f32) -> Self {
        self.force_strength = strength;
        self
    }

    pub fn with_quality_debounce(mut self, debounce: Duration) -> Self {
        self.quality_debounce = debounce.as_secs_f32();
        self
    }

    /// Share a pose label cell with its producer.
    pub fn with_label(mut self, label: LabelRef) -> Self {
        self.label = label;
        self
    }

    /// Share an audio level cell with its producer.
    pub fn with_level(mut self, level: LevelRef) -> Self {
        self.level = level;
        self
    }

    /// Replace the watchdog threshold.
    pub fn with_min_fps(mut self, min_fps: f32) -> Self {
        self.watchdog = FrameWatchdog::new(min_fps);
        self
    }

    /// Allocate and seed the fields for the configured tier, then start running.
    ///
    /// A failed allocation leaves the simulation uninitialized; the caller may
    /// pick a lower tier with [`set_quality`](Self::set_quality) and retry.
    pub fn initialize(&mut self) -> Result<(), SimError> {
        match self.state {
            SimState::Running => return Ok(()),
            SimState::Disposed => return Err(SimError::NotRunning),
            SimState::Uninitialized => {}
        }

        let fields = self.allocate(self.quality).inspect_err(|e| {
            log::warn!("failed to initialize at {:?}: {e}", self.quality);
        })?;
        self.fields = Some(fields);
        self.state = SimState::Running;
        self.first_frame = true;
        self.watchdog.clear();

        log::info!(
            "simulation running on {} backend: {} particles ({}x{})",
            self.backend.name(),
            self.quality.particle_count(),
            self.quality.edge(),
            self.quality.edge()
        );
        Ok(())
    }

    /// Advance one frame.
    ///
    /// Returns [`StepOutcome::Skipped`] unless running. Errors only when a
    /// debounced quality change fails to allocate; the previous tier keeps
    /// running in that case.
    pub fn step(&mut self, input: FrameInput) -> Result<StepOutcome, SimError> {
        if self.state != SimState::Running {
            return Ok(StepOutcome::Skipped);
        }
        self.last_elapsed = input.elapsed;

        let mut reset = None;
        if let Some(pending) = self.pending_quality {
            if input.elapsed >= pending.deadline {
                self.pending_quality = None;
                // a failed change returns before the manual reset is reported
                if self.apply_quality(pending.quality)? {
                    reset = Some(ResetReason::QualityChange);
                }
            }
        }
        let manual = self.unreported_reset.take();
        reset = reset.or(manual);

        if self.watchdog.observe(input.delta) {
            log::warn!(
                "frame time collapsed (avg {:.3}s over {} frames), reseeding",
                self.watchdog.average().unwrap_or_default(),
                self.watchdog.len()
            );
            self.reseed()?;
            reset = Some(ResetReason::Watchdog);
        }

        let params = self.params.sanitized();
        let label = self.label.get();
        let audio_level = self.read_level();
        let force = label.force(self.force_strength);
        let delta = kernels::clamp_delta(input.delta);
        if delta != input.delta && input.delta > 0.0 {
            log::debug!("clamped frame delta {:.3}s to {delta:.3}s", input.delta);
        }

        let velocity_uniforms = VelocityUniforms::new(&params, force, audio_level, delta);
        let position_uniforms =
            PositionUniforms::new(&params, self.seed_config.radius, delta, input.elapsed);

        let Some(fields) = self.fields.as_mut() else {
            return Err(SimError::NotRunning);
        };
        let feed = RenderFeed {
            edge: fields.quality.edge(),
            intensity_scale: fields.quality.intensity_scale(),
            max_life: params.max_life,
        };

        let Fields {
            seed_positions,
            seed_velocities,
            positions,
            velocities,
            ..
        } = fields;
        {
            let (pos_read, pos_write) = positions.split_mut();
            let (vel_read, vel_write) = velocities.split_mut();
            let (pos_in, vel_in) = if self.first_frame {
                (&*seed_positions, &*seed_velocities)
            } else {
                (pos_read, vel_read)
            };

            self.backend
                .run_velocity(pos_in, vel_in, vel_write, &velocity_uniforms);
            self.backend
                .run_position(pos_in, vel_write, pos_write, &position_uniforms);
            self.backend.feed_render(pos_write, feed);
            self.backend.submit();
        }
        positions.swap();
        velocities.swap();

        self.first_frame = false;
        self.frame += 1;

        let report = StepReport {
            frame: self.frame,
            reset,
            label,
            force,
            audio_level,
            delta,
            quality: self.quality,
        };
        log::trace!("{report:?}");
        Ok(StepOutcome::Stepped(report))
    }

    /// Reseed both pairs from the seed fields immediately.
    pub fn reset(&mut self) -> Result<(), SimError> {
        self.reseed()?;
        self.unreported_reset = Some(ResetReason::Manual);
        log::info!("manual reset");
        Ok(())
    }

    /// Ask for a new quality tier. The change fires on the first step whose
    /// elapsed time is at least the debounce past the latest request;
    /// repeated requests restart the countdown.
    pub fn request_quality(&mut self, quality: Quality) {
        if self.state != SimState::Running {
            self.quality = quality;
            return;
        }
        if quality == self.quality {
            if self.pending_quality.take().is_some() {
                log::debug!("quality change cancelled, staying at {quality:?}");
            }
            return;
        }
        let deadline = self.last_elapsed + self.quality_debounce;
        log::debug!("quality change to {quality:?} requested, due at t={deadline:.3}s");
        self.pending_quality = Some(PendingQuality { quality, deadline });
    }

    /// Switch tiers now, without debounce.
    ///
    /// On allocation failure the current tier is left untouched and the
    /// error is returned.
    pub fn set_quality(&mut self, quality: Quality) -> Result<(), SimError> {
        self.pending_quality = None;
        match self.state {
            SimState::Running => self.apply_quality(quality).map(|_| ()),
            SimState::Uninitialized => {
                self.quality = quality;
                Ok(())
            }
            SimState::Disposed => Err(SimError::NotRunning),
        }
    }

    /// Release every field. Later steps are no-ops.
    pub fn dispose(&mut self) {
        if self.state == SimState::Disposed {
            return;
        }
        self.backend.clear_render();
        self.fields = None;
        self.pending_quality = None;
        self.state = SimState::Disposed;
        log::info!("simulation disposed after {} frames", self.frame);
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    /// Tier currently allocated (or configured, before initialization).
    pub fn quality(&self) -> Quality {
        self.quality
    }

    /// Tier waiting for its debounce deadline, if any.
    pub fn pending_quality(&self) -> Option<Quality> {
        self.pending_quality.map(|p| p.quality)
    }

    /// Particles simulated and drawn per frame.
    pub fn particle_count(&self) -> u64 {
        self.quality.particle_count()
    }

    pub fn intensity_scale(&self) -> f32 {
        self.quality.intensity_scale()
    }

    /// Live parameters, re-read at the start of every step.
    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut SimParams {
        &mut self.params
    }

    pub fn set_force_strength(&mut self, strength: f32) {
        self.force_strength = strength;
    }

    pub fn label(&self) -> &LabelRef {
        &self.label
    }

    pub fn level(&self) -> &LevelRef {
        &self.level
    }

    /// Steps executed since creation.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Resets of any kind since creation.
    pub fn reset_count(&self) -> u64 {
        self.resets
    }

    pub fn watchdog(&self) -> &FrameWatchdog {
        &self.watchdog
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Position pair; `read()` holds the latest frame after a step.
    pub fn positions(&self) -> Option<&PingPong<B::Field>> {
        self.fields.as_ref().map(|f| &f.positions)
    }

    pub fn velocities(&self) -> Option<&PingPong<B::Field>> {
        self.fields.as_ref().map(|f| &f.velocities)
    }

    /// Seed fields `(positions, velocities)` that resets copy from.
    pub fn seed_fields(&self) -> Option<(&B::Field, &B::Field)> {
        self.fields
            .as_ref()
            .map(|f| (&f.seed_positions, &f.seed_velocities))
    }

    /// Copy the latest position field back to the host. Blocks on the device.
    pub fn read_positions(&mut self) -> Result<Vec<Texel>, SimError> {
        let fields = self.fields.as_ref().ok_or(SimError::NotRunning)?;
        self.backend.read_field(fields.positions.read())
    }

    /// Copy the latest velocity field back to the host. Blocks on the device.
    pub fn read_velocities(&mut self) -> Result<Vec<Texel>, SimError> {
        let fields = self.fields.as_ref().ok_or(SimError::NotRunning)?;
        self.backend.read_field(fields.velocities.read())
    }

    /// Copy the seeds into both read halves. Write halves and roles are untouched.
    fn reseed(&mut self) -> Result<(), SimError> {
        let Some(fields) = self.fields.as_mut() else {
            return Err(SimError::NotRunning);
        };
        let Fields {
            quality,
            seed_positions,
            seed_velocities,
            positions,
            velocities,
        } = fields;
        let backend = &mut self.backend;
        positions.reset(|read| backend.copy_field(seed_positions, read));
        velocities.reset(|read| backend.copy_field(seed_velocities, read));
        backend.submit();
        self.resets += 1;
        log::debug!(
            "reseeded {} particles (reset #{})",
            quality.particle_count(),
            self.resets
        );
        Ok(())
    }

    /// Reallocate for `quality`. Returns whether anything changed.
    fn apply_quality(&mut self, quality: Quality) -> Result<bool, SimError> {
        if self.fields.as_ref().is_some_and(|f| f.quality == quality) {
            return Ok(false);
        }
        let fields = match self.allocate(quality) {
            Ok(fields) => fields,
            Err(e) => {
                log::warn!(
                    "quality change to {quality:?} failed, keeping {:?}: {e}",
                    self.quality
                );
                return Err(e);
            }
        };

        self.fields = Some(fields);
        self.quality = quality;
        self.first_frame = true;
        self.watchdog.clear();
        self.resets += 1;
        log::info!(
            "quality set to {quality:?}: {} particles",
            quality.particle_count()
        );
        Ok(true)
    }

    /// Build a complete set of fields for `quality`, seeded and with both
    /// read halves populated. Nothing is kept on failure.
    fn allocate(&mut self, quality: Quality) -> Result<Fields<B::Field>, SimError> {
        let edge = quality.edge();
        let max_edge = self.backend.max_edge();
        if edge == 0 || edge > max_edge {
            return Err(SimError::Allocation {
                edge,
                reason: format!("{} backend supports edges up to {max_edge}", self.backend.name()),
            });
        }

        let params = self.params.sanitized();
        let seed = SeedData::generate(edge, &self.seed_config, params.max_life, &mut self.rng);
        let backend = &mut self.backend;

        let mut seed_positions = backend.allocate_field(edge, "seed positions")?;
        backend.upload_field(&mut seed_positions, &seed.positions)?;
        let mut seed_velocities = backend.allocate_field(edge, "seed velocities")?;
        backend.upload_field(&mut seed_velocities, &seed.velocities)?;

        let mut positions = PingPong::try_from_fn(|slot| {
            backend.allocate_field(edge, if slot == 0 { "positions a" } else { "positions b" })
        })?;
        let mut velocities = PingPong::try_from_fn(|slot| {
            backend.allocate_field(edge, if slot == 0 { "velocities a" } else { "velocities b" })
        })?;

        positions.reset(|read| backend.copy_field(&seed_positions, read));
        velocities.reset(|read| backend.copy_field(&seed_velocities, read));
        backend.submit();

        log::debug!("allocated six {edge}x{edge} fields on {}", backend.name());
        Ok(Fields {
            quality,
            seed_positions,
            seed_velocities,
            positions,
            velocities,
        })
    }

    /// Clamped audio level, warning once whenever the raw value leaves `[0, 1]`.
    fn read_level(&mut self) -> f32 {
        let raw = self.level.raw();
        let out_of_range = !(0.0..=1.0).contains(&raw);
        if out_of_range && !self.level_out_of_range {
            log::warn!("audio level {raw} outside [0, 1], clamping");
        }
        self.level_out_of_range = out_of_range;
        self.level.get()
    }
}

impl<B: SimBackend> Drop for ParticleSimulation<B> {
    fn drop(&mut self) {
        if self.state == SimState::Running {
            self.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::{CpuBackend, Pass};

    fn small_sim() -> ParticleSimulation<CpuBackend> {
        ParticleSimulation::new(CpuBackend::new())
            .with_quality(Quality::Custom(4))
            .with_seed(1)
    }

    #[test]
    fn test_step_before_initialize_is_skipped() {
        let mut sim = small_sim();
        assert_eq!(sim.state(), SimState::Uninitialized);
        assert_eq!(sim.step(FrameInput::new(0.016, 0.016)).unwrap(), StepOutcome::Skipped);
        assert!(sim.backend().render_frame().is_none());
    }

    #[test]
    fn test_frame_pass_order() {
        let mut sim = small_sim();
        sim.initialize().unwrap();
        sim.backend_mut().take_journal();

        sim.step(FrameInput::new(0.016, 0.016)).unwrap();
        assert_eq!(
            sim.backend_mut().take_journal(),
            vec![Pass::Velocity, Pass::Position, Pass::Feed, Pass::Submit]
        );
    }

    #[test]
    fn test_first_frame_reads_seed() {
        let mut sim = small_sim();
        sim.initialize().unwrap();
        let (seed_pos, seed_vel) = sim.seed_fields().unwrap();
        let seed_pos = seed_pos.texels().to_vec();
        let seed_vel = seed_vel.texels().to_vec();

        sim.step(FrameInput::new(0.0, 0.0)).unwrap();
        // zero delta: lifetimes and positions are unchanged
        let positions = sim.positions().unwrap().read().texels();
        for (p, s) in positions.iter().zip(&seed_pos) {
            assert_eq!(p, s);
        }
        // velocities only pass through damping when delta is zero
        let velocities = sim.velocities().unwrap().read().texels();
        for (v, s) in velocities.iter().zip(&seed_vel) {
            assert!((v[0] - s[0] * 0.99).abs() < 1e-6);
            assert_eq!(v[3], s[3]);
        }
    }

    #[test]
    fn test_force_follows_label() {
        let mut sim = small_sim().with_force_strength(10.0);
        sim.initialize().unwrap();

        sim.label().set(PoseLabel::Wide);
        let report = *sim.step(FrameInput::new(0.016, 0.016)).unwrap().report().unwrap();
        assert_eq!(report.force, Vec3::new(30.0, 0.0, 0.0));

        sim.label().set_str("bogus");
        let report = *sim.step(FrameInput::new(0.016, 0.032)).unwrap().report().unwrap();
        assert_eq!(report.label, PoseLabel::Neutral);
        assert_eq!(report.force, Vec3::ZERO);
    }

    #[test]
    fn test_audio_level_clamped() {
        let mut sim = small_sim();
        sim.initialize().unwrap();
        sim.level().set(4.0);
        let report = *sim.step(FrameInput::new(0.016, 0.016)).unwrap().report().unwrap();
        assert_eq!(report.audio_level, 1.0);
        sim.level().set(-1.0);
        let report = *sim.step(FrameInput::new(0.016, 0.032)).unwrap().report().unwrap();
        assert_eq!(report.audio_level, 0.0);
    }

    #[test]
    fn test_delta_clamped() {
        let mut sim = small_sim();
        sim.initialize().unwrap();
        let report = *sim.step(FrameInput::new(5.0, 5.0)).unwrap().report().unwrap();
        assert_eq!(report.delta, kernels::MAX_DELTA);
    }

    #[test]
    fn test_reset_requires_running() {
        let mut sim = small_sim();
        assert!(matches!(sim.reset(), Err(SimError::NotRunning)));
        sim.initialize().unwrap();
        sim.reset().unwrap();
        assert_eq!(sim.reset_count(), 1);
    }

    #[test]
    fn test_dispose_is_terminal() {
        let mut sim = small_sim();
        sim.initialize().unwrap();
        sim.step(FrameInput::new(0.016, 0.016)).unwrap();
        sim.dispose();
        assert_eq!(sim.state(), SimState::Disposed);
        assert!(sim.positions().is_none());
        assert!(sim.backend().render_frame().is_none());
        assert_eq!(sim.step(FrameInput::new(0.016, 0.032)).unwrap(), StepOutcome::Skipped);
        assert!(matches!(sim.initialize(), Err(SimError::NotRunning)));
    }
}

//! Host-side throughput of the per-texel update law and of a full
//! orchestrated frame on the CPU backend.
//!
//! Run with: `cargo bench --bench kernels`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use glam::{Vec3, Vec4};

use posefield::kernels::{position_texel, velocity_texel};
use posefield::uniforms::{PositionUniforms, VelocityUniforms};
use posefield::{CpuBackend, FrameInput, ParticleSimulation, PoseLabel, Quality, SimParams};

fn bench_texel_kernels(c: &mut Criterion) {
    let params = SimParams::default();
    let velocity = VelocityUniforms::new(&params, PoseLabel::Wide.force(30.0), 0.6, 1.0 / 60.0);
    let position = PositionUniforms::new(&params, 2.0, 1.0 / 60.0, 3.5);
    let pos = Vec4::new(0.4, -1.2, 0.8, 2.0);
    let vel = Vec4::new(0.1, 0.0, -0.3, 1.0);
    let expired = Vec4::new(0.4, -1.2, 0.8, 0.0);

    let mut group = c.benchmark_group("kernels/texel");
    group.bench_function("velocity", |b| {
        b.iter(|| velocity_texel(black_box(pos), black_box(vel), &velocity))
    });
    group.bench_function("position", |b| {
        b.iter(|| position_texel(black_box(pos), black_box(vel), 17, &position))
    });
    group.bench_function("respawn", |b| {
        b.iter(|| position_texel(black_box(expired), black_box(vel), 17, &position))
    });
    group.finish();

    // outside the boundary, so containment runs its full branch
    let far = Vec3::new(150.0, 0.0, 0.0).extend(2.0);
    c.bench_function("kernels/texel/velocity_contained", |b| {
        b.iter(|| velocity_texel(black_box(far), black_box(vel), &velocity))
    });
}

fn bench_cpu_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernels/cpu_frame");

    for edge in [32u32, 64, 128] {
        group.throughput(Throughput::Elements(u64::from(edge) * u64::from(edge)));
        group.bench_with_input(BenchmarkId::from_parameter(edge), &edge, |b, &edge| {
            let mut sim = ParticleSimulation::new(CpuBackend::new())
                .with_quality(Quality::Custom(edge))
                .with_seed(7);
            sim.initialize().unwrap();
            sim.label().set(PoseLabel::Up);
            sim.level().set(0.5);

            let mut elapsed = 0.0;
            b.iter(|| {
                elapsed += 1.0 / 60.0;
                sim.step(FrameInput::new(1.0 / 60.0, elapsed)).unwrap();
                sim.backend_mut().take_journal();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_texel_kernels, bench_cpu_frame);
criterion_main!(benches);

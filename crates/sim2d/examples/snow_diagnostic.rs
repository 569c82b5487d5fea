//! Snow block dropped onto the floor with the MLS-MPM transfer.
//!
//! Prints the block's height, spread and the average plastic volume ratio.
//! A healthy run keeps every particle inside the box and shows Jp < 1 after
//! impact (the snow compacts).
//!
//! Run with: cargo run --example snow_diagnostic -p sim2d --release

use sim2d::solver::mpm::PLASTIC_JACOBIAN_COLUMN;
use sim2d::{HybridSolver2, PhysicsAnimation, Vec2};

fn main() {
    env_logger::init();
    println!("=== SNOW DIAGNOSTIC ===\n");

    let resolution = 48;
    let mut solver = HybridSolver2::mpm_builder()
        .with_resolution([resolution, resolution])
        .with_domain_size_x(1.0)
        .with_particle_mass(0.01)
        .with_particle_radius(0.005)
        .build()
        .expect("valid solver");

    {
        let particles = solver.particle_system_data_mut();
        let spacing = 0.5 / resolution as f32;
        for j in 0..16 {
            for i in 0..16 {
                let p = Vec2::new(0.4 + spacing * i as f32, 0.5 + spacing * j as f32);
                particles.add_particle(p, Vec2::new(0.0, -1.0), Vec2::ZERO);
            }
        }
    }
    println!("Particles: {}", solver.particle_system_data().number_of_particles());

    let dt = 1.0 / 60.0;
    println!(
        "{:>6} {:>9} {:>8} {:>8} {:>8} {:>8}",
        "Frame", "Substeps", "MinY", "Width", "AvgJp", "MaxVel"
    );
    println!("{}", "-".repeat(54));

    for frame in 0..90 {
        let report = solver.advance(dt).expect("step");
        if frame % 10 != 0 {
            continue;
        }

        let particles = solver.particle_system_data();
        let (mut min_x, mut max_x, mut min_y) = (f32::MAX, f32::MIN, f32::MAX);
        for p in particles.positions() {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
        }
        let max_vel = particles
            .velocities()
            .iter()
            .map(|v| v.length())
            .fold(0.0, f32::max);
        let avg_jp = particles
            .scalar_data_index(PLASTIC_JACOBIAN_COLUMN)
            .map(|h| {
                let jp = particles.scalar_data(h);
                jp.iter().sum::<f32>() / jp.len().max(1) as f32
            })
            .unwrap_or(1.0);

        println!(
            "{:>6} {:>9} {:>8.3} {:>8.3} {:>8.4} {:>8.3}",
            frame,
            report.substeps,
            min_y,
            max_x - min_x,
            avg_jp,
            max_vel
        );
    }

    let diag = solver.diagnostics();
    println!("\nFrames: {}  substeps: {}", diag.frames, diag.substeps);
    println!(
        "Clamped: {}  removed: {}",
        diag.particles_clamped, diag.particles_removed
    );
}

//! Dam break in a closed tank with the FLIP transfer.
//!
//! PASS CRITERIA:
//! 1. No particles are lost
//! 2. The water column spreads to the right wall
//! 3. Pressure solves converge on most sub-steps
//!
//! Run with: cargo run --example dam_break_diagnostic -p sim2d --release

use std::sync::Arc;

use sim2d::particle::VolumeParticleEmitter2;
use sim2d::{Box2, HybridSolver2, PhysicsAnimation, Vec2};

fn main() {
    env_logger::init();
    println!("=== DAM BREAK DIAGNOSTIC ===\n");

    let emitter = VolumeParticleEmitter2::builder()
        .with_surface(Arc::new(Box2::new(Vec2::new(0.0, 0.0), Vec2::new(0.25, 0.5))))
        .with_spacing(0.0125)
        .with_jitter(0.1)
        .with_random_seed(3)
        .build()
        .expect("valid emitter");

    let mut solver = HybridSolver2::flip_builder()
        .with_resolution([64, 32])
        .with_domain_size_x(1.0)
        .with_particle_radius(0.004)
        .with_emitter(Box::new(emitter))
        .build()
        .expect("valid solver");

    let dt = 1.0 / 60.0;
    let mut initial_count = 0;
    println!(
        "{:>6} {:>8} {:>8} {:>8} {:>10} {:>6}",
        "Frame", "Count", "MaxX", "AvgVel", "Residual", "Iters"
    );
    println!("{}", "-".repeat(52));

    for frame in 0..120 {
        let report = solver.advance(dt).expect("step");
        if frame == 0 {
            initial_count = report.particle_count;
        }
        if frame % 10 != 0 {
            continue;
        }

        let particles = solver.particle_system_data();
        let max_x = particles
            .positions()
            .iter()
            .map(|p| p.x)
            .fold(f32::MIN, f32::max);
        let avg_vel = particles
            .velocities()
            .iter()
            .map(|v| v.length())
            .sum::<f32>()
            / particles.number_of_particles().max(1) as f32;
        let (residual, iterations) = report
            .pressure
            .map(|p| (p.residual, p.iterations))
            .unwrap_or((0.0, 0));

        println!(
            "{:>6} {:>8} {:>8.3} {:>8.3} {:>10.2e} {:>6}",
            frame, report.particle_count, max_x, avg_vel, residual, iterations
        );
    }

    let final_count = solver.particle_system_data().number_of_particles();
    let diag = solver.diagnostics();
    println!("\nParticles: {} -> {}", initial_count, final_count);
    println!(
        "Pressure solves: {} ({} did not converge)",
        diag.pressure_solves, diag.non_converged_solves
    );
    if final_count != initial_count {
        println!("FAIL: lost {} particles", initial_count - final_count);
    }
}

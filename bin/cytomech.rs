//! Runs a small cytoskeletal system: dynamic fibers confined in a sphere,
//! cross-linked by diffusing motor couples.

use anyhow::Context;
use clap::Parser;

use cytomech_mech::FiberEnd;
use cytomech_numerical::Vec3;
use cytomech_space::{Confinement, SphereSpace, Space};
use cytomech_sim::{CoupleProp, FiberProp, HandProp, Properties, Simul, SimulProp};

#[derive(Parser)]
#[command(name = "cytomech", about = "constrained Langevin dynamics of cytoskeletal filaments")]
struct Args {
    /// number of time steps to run
    #[arg(long, default_value_t = 1000)]
    steps: usize,

    /// time step, in seconds
    #[arg(long, default_value_t = 0.001)]
    dt: f64,

    /// number of fibers
    #[arg(long, default_value_t = 20)]
    fibers: usize,

    /// number of motor couples
    #[arg(long, default_value_t = 200)]
    couples: usize,

    /// radius of the confining sphere
    #[arg(long, default_value_t = 5.0)]
    radius: f64,

    /// seed of the random generator
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// write the final state to this trajectory file
    #[arg(long)]
    output: Option<std::path::PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut props = Properties::new(SimulProp {
        time_step: args.dt,
        seed: args.seed,
        ..Default::default()
    });

    let mut fiber = FiberProp::new("microtubule");
    fiber.rigidity = 22.0;
    fiber.segmentation = 0.5;
    fiber.confine = Confinement::Inside;
    fiber.confine_stiffness = 100.0;
    let fiber = props.add_fiber(fiber);

    let mut motor = HandProp::new("kinesin");
    motor.binding_rate = 5.0;
    motor.binding_range = 0.05;
    motor.unbinding_rate = 0.5;
    motor.unbinding_force = 6.0;
    motor.speed = 0.8;
    motor.stall_force = 5.0;
    let motor = props.add_hand(motor);

    let mut couple = CoupleProp::new("motor_complex", motor, motor);
    couple.stiffness = 200.0;
    couple.diffusion = 10.0;
    couple.confine = Confinement::Inside;
    let couple = props.add_couple(couple);

    let mut simul = Simul::new(props).context("invalid configuration")?;
    simul.add_space(Box::new(SphereSpace::new(args.radius)));

    // straight fibers through random positions and orientations
    for _ in 0..args.fibers {
        let (pos, dir) = {
            let space = SphereSpace::new(args.radius - 1.0);
            let rng = simul.rng_mut();
            (space.random_place(rng), Vec3::random_unit(rng))
        };
        simul.new_fiber(fiber, 3.0, &pos, &dir, FiberEnd::Center)?;
    }
    for _ in 0..args.couples {
        let pos = {
            let space = SphereSpace::new(args.radius);
            let rng = simul.rng_mut();
            space.random_place(rng)
        };
        simul.new_couple(couple, &pos);
    }

    log::info!(
        "running {} steps of {}s with {} fibers and {} couples",
        args.steps,
        args.dt,
        args.fibers,
        args.couples
    );
    let start = std::time::Instant::now();
    for s in 0..args.steps {
        simul.step().with_context(|| format!("step {} failed", s))?;
        if (s + 1) % 100 == 0 {
            log::info!(
                "step {:>6}  t={:.3}s  bridging couples: {}",
                s + 1,
                simul.time(),
                simul.couples.bridging.len()
            );
        }
    }
    let elapsed = start.elapsed();
    println!(
        "simulated {:.3}s in {:.2?} ({} fibers, {} couples, {} bridging)",
        simul.time(),
        elapsed,
        simul.fibers.len(),
        args.couples,
        simul.couples.bridging.len()
    );

    if let Some(path) = args.output {
        let mut file = std::fs::File::create(&path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        simul.write_frame(&mut file).context("cannot write trajectory frame")?;
        println!("wrote final frame to {}", path.display());
    }
    Ok(())
}

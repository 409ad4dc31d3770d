use clap::Parser;
use limb_ik_lib::motion::body::{BodyMotion, FlatGround};
use limb_ik_lib::motion::controller::MovementInput;
use limb_ik_lib::motion::gait::Side;
use limb_ik_lib::simulation::Simulation;
use std::path::PathBuf;

/// args
#[derive(Parser)]
struct Cli {
    /// Specify path to the settings file.
    #[arg(
        short,
        long,
        default_value = "configs/spider.toml",
        value_name = "FILE PATH"
    )]
    settings: PathBuf,
    /// Number of fixed ticks to run
    #[arg(short, long, default_value_t = 500)]
    ticks: u64,
    /// Forward axis input in [-1, 1]
    #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
    forward: f64,
    /// Turn axis input in [-1, 1]
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    turn: f64,
    /// Height of the flat ground
    #[arg(short, long, default_value_t = 0.0, allow_hyphen_values = true)]
    ground: f64,
}

fn main() {
    env_logger::init();
    let args = Cli::parse();

    let mut sim = match Simulation::from_settings_file(&args.settings, FlatGround::new(args.ground)) {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    let input = MovementInput::new(args.forward, args.turn);

    let mut steps = [0usize; 2];
    let mut worst_error = 0.0f64;
    for _ in 0..args.ticks {
        let report = sim.tick(&input);
        for stepped in &report.stepped {
            let idx = match stepped.side {
                Side::Primary => 0,
                Side::Opposite => 1,
            };
            steps[idx] += 1;
        }
        for (primary, opposite) in &report.leg_errors {
            worst_error = worst_error.max(*primary).max(*opposite);
        }
    }

    let pose = sim.body().pose();
    println!("ticks:            {}", sim.tick_count());
    println!("primary steps:    {}", steps[0]);
    println!("opposite steps:   {}", steps[1]);
    println!("worst leg error:  {worst_error:.4}");
    println!("body position:    {:?}", pose.translation.vector.as_slice());
    println!("body heading:     {:.1} deg", pose.rotation.angle().to_degrees());
}

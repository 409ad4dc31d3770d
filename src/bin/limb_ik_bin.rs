extern crate limb_ik_lib;
use limb_ik_lib::motion::body::{BodyMotion, FlatGround};
use limb_ik_lib::motion::controller::MovementInput;
use limb_ik_lib::simulation::Simulation;

fn main() {
    env_logger::init();

    let default_path_to_setting = "configs/spider.toml";
    let path_to_setting = std::env::args()
        .nth(1)
        .unwrap_or_else(|| default_path_to_setting.to_string());
    let mut sim = match Simulation::from_settings_file(&path_to_setting, FlatGround::new(0.0)) {
        Ok(sim) => sim,
        Err(err) => {
            log::error!("{err}");
            std::process::exit(1);
        }
    };

    // walk forward, then turn left
    for i in 0..400 {
        let input = if i < 250 {
            MovementInput::forward()
        } else {
            MovementInput::new(0.0, 1.0)
        };
        let report = sim.tick(&input);
        if report.phase_flipped {
            println!(
                "tick {:>4}: {} legs stepped, worst error {:.4}",
                report.tick,
                report.stepped.len(),
                report
                    .leg_errors
                    .iter()
                    .fold(0.0f64, |acc, (p, o)| acc.max(*p).max(*o))
            );
        }
    }
    let pose = sim.body().pose();
    println!("Body position: {:?}", pose.translation.vector.as_slice());
}

use approx::{assert_abs_diff_eq, assert_relative_eq};
use limb_ik_lib::groove::fabrik::{FabrikParams, FabrikSolver};
use limb_ik_lib::groove::gradient_descent::{GradientDescentParams, GradientDescentSolver};
use limb_ik_lib::groove::solver::{IkSolver, Target};
use limb_ik_lib::motion::body::{FlatGround, KinematicBody};
use limb_ik_lib::motion::controller::MovementInput;
use limb_ik_lib::motion::gait::{GaitCoordinator, Side};
use limb_ik_lib::simulation::Simulation;
use limb_ik_lib::spacetime::chain::{JointChain, JointDescriptor};
use limb_ik_lib::spacetime::constraint::{JointConstraint, RotationAxis};
use limb_ik_lib::utils::config_parser::Config;
use nalgebra::{Isometry3, Vector3};

const SPIDER: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/configs/spider.toml");

/// Root plus two unit bones, slightly bent, reaching along +Z.
fn two_bone_chain() -> JointChain {
    let skeleton = vec![
        JointDescriptor::new("root", Vector3::zeros()),
        JointDescriptor::new("knee", Vector3::new(0.0, 0.6, 0.8)),
        JointDescriptor::new("foot", Vector3::new(0.0, -0.6, 0.8)),
    ];
    JointChain::new(Isometry3::identity(), Isometry3::identity(), &skeleton, 2).unwrap()
}

#[test]
fn fabrik_reaches_target_within_iteration_cap() {
    let params = FabrikParams {
        iterations: 10,
        ..FabrikParams::default()
    };
    let target = Target::at(Vector3::new(0.0, 0.0, 1.5));
    let mut solver = FabrikSolver::new(two_bone_chain(), 0.09, params, Some(target));
    solver.resolve();
    assert!(solver.current_error() < 0.09);

    let joints = solver.chain().joints();
    for pair in joints.windows(2) {
        assert_relative_eq!((pair[1].position - pair[0].position).norm(), 1.0, epsilon = 1e-9);
    }
    assert_relative_eq!(joints[0].position, Vector3::zeros());
}

#[test]
fn fabrik_stretches_towards_unreachable_target() {
    let target = Target::at(Vector3::new(0.0, 0.0, 3.0));
    let mut solver = FabrikSolver::new(two_bone_chain(), 0.09, FabrikParams::default(), Some(target));
    solver.resolve();

    let tip = solver.chain().end_effector().position;
    assert_relative_eq!(tip.norm(), 2.0, epsilon = 1e-9);
    assert_relative_eq!(tip, Vector3::new(0.0, 0.0, 2.0), epsilon = 1e-9);
    assert_relative_eq!(solver.current_error(), 1.0, epsilon = 1e-9);

    // off axis as well
    let direction = Vector3::new(1.0, 2.0, 2.0).normalize();
    solver.set_target_position(direction * 5.0);
    solver.resolve();
    assert_relative_eq!(solver.chain().end_effector().position, direction * 2.0, epsilon = 1e-9);
}

#[test]
fn gradient_descent_error_never_grows() {
    let mut solver = GradientDescentSolver::new(
        two_bone_chain(),
        0.09,
        GradientDescentParams::default(),
        Some(Target::at(Vector3::new(0.0, 0.0, 1.5))),
    );
    let mut previous = solver.current_error();
    let mut resolves = 0;
    while previous >= 0.09 {
        assert!(resolves < 20, "no convergence after {resolves} resolves, error {previous}");
        solver.resolve();
        let error = solver.current_error();
        assert!(error <= previous + 1e-12);
        previous = error;
        resolves += 1;
    }

    // converged: further resolves leave the pose alone
    let pose: Vec<Vector3<f64>> = solver.chain().joints().iter().map(|j| j.position).collect();
    solver.resolve();
    for (joint, before) in solver.chain().joints().iter().zip(pose) {
        assert_relative_eq!(joint.position, before);
    }
}

#[test]
fn fabrik_error_never_grows_with_default_params() {
    let mut solver = FabrikSolver::new(
        two_bone_chain(),
        0.09,
        FabrikParams::default(),
        Some(Target::at(Vector3::new(0.0, 0.0, 1.5))),
    );
    let mut previous = solver.current_error();
    for _ in 0..10 {
        solver.resolve();
        let error = solver.current_error();
        assert!(error <= previous + 1e-12);
        assert!(error < 0.09);
        previous = error;
    }
}

#[test]
fn gradient_descent_respects_hinge() {
    let knee = JointDescriptor::new("knee", Vector3::new(0.0, 0.6, 0.8))
        .with_constraint(JointConstraint::hinge(RotationAxis::X, -90.0, 10.0));
    let skeleton = vec![
        JointDescriptor::new("root", Vector3::zeros()),
        knee,
        JointDescriptor::new("foot", Vector3::new(0.0, -0.6, 0.8)),
    ];
    let chain = JointChain::new(Isometry3::identity(), Isometry3::identity(), &skeleton, 2).unwrap();
    let mut solver = GradientDescentSolver::new(
        chain,
        0.09,
        GradientDescentParams::default(),
        Some(Target::at(Vector3::new(0.5, 0.5, 1.0))),
    );

    for _ in 0..500 {
        solver.resolve();
        let knee_angles = solver.joint_angles()[1];
        assert!((-90.0..=10.0).contains(&knee_angles.x));
        assert_abs_diff_eq!(knee_angles.y, 0.0);
        assert_abs_diff_eq!(knee_angles.z, 0.0);
        assert!(solver.current_error().is_finite());
    }
}

#[test]
fn stationary_anchors_never_step() {
    let config = Config::from_settings_file(SPIDER).unwrap();
    let body = config.body.isometry();
    let pairs = config.build_leg_pairs(body).unwrap();
    assert_eq!(pairs.len(), 4);
    let mut gait = GaitCoordinator::new(body, pairs, config.gait).unwrap();
    let ground = FlatGround::new(0.0);
    for _ in 0..200 {
        let report = gait.step(&ground);
        assert!(report.stepped.is_empty());
        assert!(!report.phase_flipped);
        gait.resolve();
    }
    assert!(gait.primary_active());
}

#[test]
fn spider_alternates_while_walking() {
    let mut sim = Simulation::from_settings_file(SPIDER, FlatGround::new(0.0)).unwrap();
    let mut previous: Option<Side> = None;
    let mut flips = 0;
    for tick in 0..600 {
        let input = if tick < 400 {
            MovementInput::forward()
        } else {
            MovementInput::new(0.5, 1.0)
        };
        let report = sim.tick(&input);
        assert_eq!(report.phase_flipped, !report.stepped.is_empty());
        let Some(first) = report.stepped.first() else {
            continue;
        };
        assert!(report.stepped.iter().all(|s| s.side == first.side));
        if let Some(side) = previous {
            assert_ne!(side, first.side);
        }
        previous = Some(first.side);
        flips += 1;
    }
    assert!(flips >= 4);
    assert_eq!(sim.gait().primary_active(), flips % 2 == 0);
}

#[test]
fn idle_spider_keeps_pose() {
    let config = Config::from_settings_file(SPIDER).unwrap();
    let start = config.body.isometry();
    let mut sim = Simulation::new(config, FlatGround::new(0.0), KinematicBody::new(start)).unwrap();
    for _ in 0..100 {
        let report = sim.tick(&MovementInput::default());
        assert!(report.stepped.is_empty());
        for (primary, opposite) in report.leg_errors {
            assert!(primary < 0.09 && opposite < 0.09);
        }
    }
    assert_relative_eq!(*sim.gait().body(), start, epsilon = 1e-12);
}

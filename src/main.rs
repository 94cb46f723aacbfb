//! Headless gate racer.
//!
//! `fly` runs the fixed-step simulation with the autopilot at the stick and
//! logs progress; `generate` writes the built-in course plus a random
//! asteroid field to a course file.

use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::Context;
use bevy::{app::ScheduleRunnerPlugin, log::LogPlugin, prelude::*, time::TimeUpdateStrategy};
use clap::{Args, Parser, Subcommand};
use flight_physics::ShipConstants;
use gaterace::{
    config::SimConfig,
    course::{Course, check_field_size},
    encounter::{Encounter, RaceStatus},
    ship::{PilotMode, ShipPlugin},
};
use rand::{SeedableRng, rngs::StdRng};

#[derive(Parser, Debug)]
#[command(version, about = "Fly a thruster-driven ship through a gate course")]
struct Cli {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Fly a course with the autopilot until it ends or time runs out.
    Fly(FlyArgs),
    /// Write the built-in course with a random asteroid field.
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct FlyArgs {
    /// Course file to fly. Falls back to the built-in course if it can't be
    /// loaded.
    #[arg(long)]
    course: Option<PathBuf>,
    /// Simulation config (JSON).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Stop after this much simulated time, s.
    #[arg(long)]
    max_seconds: Option<f64>,
    /// Seed for the asteroid field of the built-in course.
    #[arg(long)]
    seed: Option<u64>,
    /// Pace the simulation against the wall clock instead of running flat out.
    #[arg(long)]
    realtime: bool,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Where to write the course.
    out: PathBuf,
    #[arg(long, default_value = "Generated Course")]
    name: String,
    #[arg(long, default_value_t = 40)]
    asteroids: usize,
    /// Edge of the cube the asteroids are scattered in, m.
    #[arg(long, default_value_t = 10_000.0, value_parser = parse_field_size)]
    field_size: f64,
    #[arg(long, default_value_t = 300.0)]
    clearance: f64,
    #[arg(long)]
    seed: Option<u64>,
}

fn parse_field_size(arg: &str) -> Result<f64, String> {
    let size: f64 = arg.parse().map_err(|err| format!("{err}"))?;
    check_field_size(size)
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    match cli.action {
        Action::Fly(args) => fly(args),
        Action::Generate(args) => generate(args).map(|()| ExitCode::SUCCESS),
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn builtin_with_field(config: &SimConfig) -> Course {
    let mut course = Course::builtin();
    let mut rng = seeded_rng(config.field.seed);
    course.scatter_asteroids(
        &mut rng,
        config.field.asteroids,
        config.field.size,
        config.field.clearance,
    );
    course
}

fn fly(args: FlyArgs) -> anyhow::Result<ExitCode> {
    let mut config = match &args.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if let Some(max_seconds) = args.max_seconds {
        config.max_seconds = max_seconds;
    }
    if args.seed.is_some() {
        config.field.seed = args.seed;
    }
    config.validate()?;

    let tick = Duration::from_secs_f64(config.tick_seconds());
    let wait = if args.realtime { tick } else { Duration::ZERO };

    let mut app = App::new();
    app.add_plugins((
        MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(wait)),
        LogPlugin::default(),
    ));
    if !args.realtime {
        // One fixed step per app update, as fast as the machine allows.
        app.insert_resource(TimeUpdateStrategy::ManualDuration(tick));
    }

    let fallback = builtin_with_field(&config);
    let course = match &args.course {
        Some(path) => {
            let (course, err) = Course::load_or_keep(path, fallback);
            match err {
                Some(err) if err.is_not_found() => {
                    warn!("{err}; flying the built-in course instead");
                }
                Some(err) => {
                    error!("{err}; flying the built-in course instead");
                }
                None => {}
            }
            course
        }
        None => fallback,
    };
    info!(
        "Course '{}': {} gates, {} asteroids",
        course.name,
        course.gates.len(),
        course.obstacles.len()
    );

    let constants = ShipConstants::from_config(&config.ship);
    app.insert_resource(Time::<Fixed>::from_hz(config.tick_hz))
        .insert_resource(Encounter::new(course, constants.bounding_radius))
        .insert_resource(constants)
        .insert_resource(PilotMode::Autopilot)
        .insert_resource(config)
        .add_plugins(ShipPlugin)
        .add_systems(Update, stop_when_done);

    match app.run() {
        AppExit::Success => Ok(ExitCode::SUCCESS),
        AppExit::Error(code) => Ok(ExitCode::from(code.get())),
    }
}

fn stop_when_done(
    time: Res<Time>,
    config: Res<SimConfig>,
    encounter: Res<Encounter>,
    mut exit: MessageWriter<AppExit>,
) {
    match encounter.status() {
        RaceStatus::CourseComplete => {
            info!(
                "All {} gates passed in {:.1} s",
                encounter.gates().len(),
                time.elapsed_secs_f64()
            );
            exit.write(AppExit::Success);
        }
        RaceStatus::GameOver => {
            warn!(
                "Game over at gate {}/{}",
                encounter.active_gate_index() + 1,
                encounter.gates().len()
            );
            exit.write(AppExit::from_code(2));
        }
        RaceStatus::Playing => {
            if time.elapsed_secs_f64() >= config.max_seconds {
                warn!(
                    "Time limit of {:.0} s reached at gate {}/{}",
                    config.max_seconds,
                    encounter.active_gate_index() + 1,
                    encounter.gates().len()
                );
                exit.write(AppExit::from_code(3));
            }
        }
    }
}

fn generate(args: GenerateArgs) -> anyhow::Result<()> {
    let mut rng = seeded_rng(args.seed);
    let mut course = Course::builtin();
    course.name = args.name;
    course.scatter_asteroids(&mut rng, args.asteroids, args.field_size, args.clearance);
    course
        .save(&args.out)
        .with_context(|| format!("writing course to {}", args.out.display()))?;

    println!(
        "Wrote '{}' with {} gates and {} asteroids to {}",
        course.name,
        course.gates.len(),
        course.obstacles.len(),
        args.out.display()
    );
    Ok(())
}

use std::{
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use clap::{Args, Parser, Subcommand};
use hearing_meter_core::{
    immersive, Achievement, AppConfig, AppStorage, AudioCaptureSource, CalibrationOffset,
    ExposureAccumulator, ImmersiveEvent, ImmersiveExperience, JsonFileStore, MeterSessionController,
    MeterSnapshot, SessionRecorder, SyntheticSource, Ticker, UserProfile,
};
use tracing_subscriber::EnvFilter;

fn main() -> hearing_meter_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    if let Some(data) = cli.data {
        config.storage.path = data;
    }

    let mut storage = AppStorage::new(JsonFileStore::open(&config.storage.path)?);
    let first_visit = storage.check_first_visit()?;
    let mut profile = storage.load_profile()?;
    profile.record_visit();
    tracing::info!(first_visit, visits = profile.visit_count, "session opened");

    match cli.command {
        Commands::Measure(args) => run_measure(&config, &mut storage, &mut profile, args)?,
        Commands::Experience(args) => run_experience(&mut profile, args),
        Commands::History => print_history(&storage)?,
        Commands::Status => print_status(&profile),
        Commands::Wipe => {
            storage.wipe()?;
            println!("All stored data removed.");
            return Ok(());
        }
    }

    storage.save_profile(&profile)
}

fn run_measure(
    config: &AppConfig,
    storage: &mut AppStorage<JsonFileStore>,
    profile: &mut UserProfile,
    args: MeasureArgs,
) -> hearing_meter_core::Result<()> {
    let calibration = match args.calibration {
        Some(db) => {
            if CalibrationOffset::is_out_of_range(db) {
                tracing::warn!(requested = db, "calibration offset outside [-20, 20], clamping");
            }
            CalibrationOffset::new(db)
        }
        None => config.meter.calibration(),
    };

    let exposure = ExposureAccumulator::new(profile.exposure);
    let recorder = SessionRecorder::with_history(storage.load_history()?);
    let session = Session {
        calibration,
        frame_interval: config.meter.frame_interval(),
        seconds: args.seconds.max(1),
        exposure: exposure.clone(),
        recorder,
    };

    let recorder = match args.synthetic_level {
        Some(level) => measure(SyntheticSource::constant(level), session, profile)?,
        #[cfg(feature = "microphone")]
        None => measure(
            hearing_meter_core::MicrophoneSource::new(config.meter.fft_size, config.meter.smoothing),
            session,
            profile,
        )?,
        #[cfg(not(feature = "microphone"))]
        None => {
            return Err(hearing_meter_core::MeterError::msg(
                "built without microphone support; pass --synthetic-level or enable the `microphone` feature",
            ))
        }
    };

    profile.exposure = exposure.totals();
    storage.save_history(&recorder.to_vec())
}

struct Session {
    calibration: CalibrationOffset,
    frame_interval: Duration,
    seconds: u32,
    exposure: ExposureAccumulator,
    recorder: SessionRecorder,
}

/// Drives one measuring session on this thread until `seconds` have elapsed
/// and hands back the recorder with the updated history.
fn measure<S: AudioCaptureSource>(
    source: S,
    session: Session,
    profile: &mut UserProfile,
) -> hearing_meter_core::Result<SessionRecorder> {
    let mut meter = MeterSessionController::new(
        source,
        session.calibration,
        session.exposure,
        session.recorder,
    );

    if let Err(err) = meter.start() {
        eprintln!("{}", err.user_message());
        return Err(err.into());
    }
    profile.unlock(Achievement::MeterStarted);

    let mut ticker = Ticker::new(session.frame_interval, Instant::now());
    'session: loop {
        let due = ticker.poll(Instant::now());
        if due.frame {
            meter.frame();
        }
        for _ in 0..due.seconds {
            meter.tick_second();
            print_snapshot(&meter.snapshot());
            if meter.elapsed_seconds() >= session.seconds {
                break 'session;
            }
        }
        thread::sleep(ticker.until_next(Instant::now()));
    }

    match meter.stop() {
        Some(record) => {
            println!(
                "Session saved: {} average {} dB, peak {} dB ({})",
                format_elapsed(record.duration_seconds),
                record.average_db,
                record.maximum_db,
                record.risk_label
            );
            for achievement in Achievement::earned_by_session(record.duration_seconds) {
                profile.unlock(achievement);
            }
        }
        None => println!("Session too short to keep."),
    }

    Ok(meter.recorder().clone())
}

fn run_experience(profile: &mut UserProfile, args: ExperienceArgs) {
    let exposure = ExposureAccumulator::new(profile.exposure);
    let mut experience = ImmersiveExperience::new(exposure.clone());
    let step_sleep = immersive::STEP.div_f32(args.speed.max(0.1));
    let steps_per_second = (1_000 / immersive::STEP.as_millis()) as u32;
    let max_steps = args.max_seconds * steps_per_second;

    let mut handle = |events: Vec<ImmersiveEvent>, experience: &ImmersiveExperience| {
        for event in events {
            match event {
                ImmersiveEvent::PhaseEntered(_) => {
                    let phase = experience.phase();
                    println!("== {}: {}", phase.name, phase.description);
                }
                ImmersiveEvent::Unlocked(achievement) => {
                    profile.unlock(achievement);
                }
                ImmersiveEvent::Completed => println!("Experience complete."),
            }
        }
    };

    let events = experience.start();
    println!("== {}: {}", experience.phase().name, experience.phase().description);
    handle(events, &experience);

    let mut waiting_steps = 0;
    for step in 1..=max_steps {
        if !experience.is_playing() {
            break;
        }

        let events = experience.step();
        handle(events, &experience);

        if experience.phase().duration.is_none() && !experience.is_protected() {
            waiting_steps += 1;
            if args.protect && waiting_steps == steps_per_second * 3 {
                let events = experience.toggle_protection();
                println!("Earmuffs on.");
                handle(events, &experience);
            }
        }

        if step % steps_per_second == 0 {
            experience.tick_second();
            println!(
                "{:>5.1} dB  volume {:>3.0}%{}",
                experience.level_db(),
                experience.volume() * 100.0,
                if experience.warning_active() { "  !! unprotected" } else { "" }
            );
        }
        thread::sleep(step_sleep);
    }

    if !experience.is_completed() {
        experience.skip();
        println!("Experience stopped before the end.");
    }
    profile.exposure = exposure.totals();
}

fn print_snapshot(snapshot: &MeterSnapshot) {
    println!(
        "{}  now {:>3} dB  avg {:>3}  max {:>3}  {:<8} safe: {}{}",
        format_elapsed(snapshot.elapsed_seconds),
        snapshot.current.value(),
        snapshot.average.value(),
        snapshot.maximum.value(),
        snapshot.risk.level.label(),
        snapshot.risk.safe_exposure.label,
        if snapshot.alert_active { "  [ALERT]" } else { "" }
    );
    if snapshot.alert_active {
        println!("    {}", snapshot.risk.advisory);
    }
}

fn print_history(storage: &AppStorage<JsonFileStore>) -> hearing_meter_core::Result<()> {
    let history = storage.load_history()?;
    if history.is_empty() {
        println!("No measurements yet.");
    }
    for record in history {
        println!(
            "{}  {}  avg {} dB  max {} dB  {}",
            record.timestamp_label,
            format_elapsed(record.duration_seconds),
            record.average_db,
            record.maximum_db,
            record.risk_label
        );
    }
    Ok(())
}

fn print_status(profile: &UserProfile) {
    println!("Visits: {}", profile.visit_count);
    println!(
        "Exposure  safe {:.3}  risk {:.3}  danger {:.3}",
        profile.exposure.safe, profile.exposure.risk, profile.exposure.danger
    );
    let unlocked: Vec<&str> = profile
        .unlocked_achievements
        .iter()
        .map(|achievement| achievement.id())
        .collect();
    println!("Achievements: {}", unlocked.join(", "));
}

fn format_elapsed(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Hearing protection decibel meter", long_about = None)]
struct Cli {
    /// Data file holding the profile and measurement history.
    #[arg(long, global = true)]
    data: Option<PathBuf>,
    /// JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Measure ambient loudness in real time.
    Measure(MeasureArgs),
    /// Walk through the simulated factory floor.
    Experience(ExperienceArgs),
    /// List recorded measuring sessions, newest first.
    History,
    /// Show accumulated exposure and unlocked achievements.
    Status,
    /// Remove all stored data.
    Wipe,
}

#[derive(Args, Debug)]
struct MeasureArgs {
    /// How long to measure for, in seconds.
    #[arg(short, long, default_value_t = 30)]
    seconds: u32,
    /// Calibration offset in dB, between -20 and 20.
    #[arg(short, long, allow_hyphen_values = true)]
    calibration: Option<i32>,
    /// Feed a constant magnitude (0-255) into every bin instead of the microphone.
    #[arg(long)]
    synthetic_level: Option<u8>,
}

#[derive(Args, Debug)]
struct ExperienceArgs {
    /// Playback speed multiplier.
    #[arg(long, default_value_t = 1.0)]
    speed: f32,
    /// Put the earmuffs on automatically when the walkthrough asks for them.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    protect: bool,
    /// Give up after this many simulated seconds.
    #[arg(long, default_value_t = 120)]
    max_seconds: u32,
}

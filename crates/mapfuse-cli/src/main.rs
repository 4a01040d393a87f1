//! `mapfuse-cli` – headless mapping sessions from the command line.
//!
//! This binary:
//!
//! 1. Loads `~/.mapfuse/config.toml` (or the file given with `--config`),
//!    applying `MAPFUSE_*` environment overrides.
//! 2. Starts a simulated pose stream and a simulated downward camera.
//! 3. Runs every frame through the [`MapBuilder`] until the camera stops or
//!    **Ctrl-C** is pressed.
//! 4. Prints a summary of what was composited and skipped.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use colored::Colorize;
use tracing::{info, warn};

use mapfuse_hal::sim::{SimCamera, SimTrajectory};
use mapfuse_middleware::{EventBus, PoseBuffer, Topic, TopicReceiver};
use mapfuse_runtime::{MapBuilder, SessionSummary, StopReason, init_tracing, run_session};
use mapfuse_types::{MapError, MapEventPayload, StampedPose};

use config::Config;

const USAGE: &str = "usage: mapfuse [--config <path>] [--write-config <path>]";

/// Parsed command line.
#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    write_config: Option<PathBuf>,
    help: bool,
}

fn parse_args(mut argv: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut args = Args::default();
    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = argv.next().ok_or("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--write-config" => {
                let path = argv.next().ok_or("--write-config needs a path")?;
                args.write_config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => args.help = true,
            other => return Err(format!("unknown argument '{other}'")),
        }
    }
    Ok(args)
}

fn main() -> ExitCode {
    // Hold the guard until exit so pending spans are flushed.
    let _tracing = init_tracing("mapfuse");

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}: {e}\n{USAGE}", "error".red().bold());
            return ExitCode::from(2);
        }
    };
    if args.help {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    print_banner();

    let cfg = match config::load(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            println!("{}: {e}", "Config error".red());
            return ExitCode::FAILURE;
        }
    };
    match &args.config {
        Some(path) => println!("  Config loaded from {}", path.display().to_string().bold()),
        None => println!(
            "  Config: {} (defaults where absent)",
            config::config_path().display().to_string().bold()
        ),
    }

    if let Some(path) = &args.write_config {
        return match config::save_to(&cfg, path) {
            Ok(()) => {
                println!("  {} Config written to {}", "✓".green().bold(), path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("{}: {e}", "Error saving config".red());
                ExitCode::FAILURE
            }
        };
    }

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – finishing the current frame …".yellow().bold());
        shutdown_flag.store(true, Ordering::Release);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; the session can only end on its own");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            println!("{}: {e}", "Failed to start async runtime".red());
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cfg, shutdown)) {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}: {e}", "Mapping session failed".red().bold());
            ExitCode::FAILURE
        }
    }
}

/// Run one simulated mapping session.
async fn run(cfg: &Config, shutdown: Arc<AtomicBool>) -> Result<SessionSummary, MapError> {
    let start = Utc::now();
    let sim = &cfg.sim;
    let period = Duration::from_millis(sim.period_ms.max(1));
    let frame_period = chrono::Duration::from_std(period)
        .map_err(|e| MapError::Configuration(format!("sim period out of range: {e}")))?;

    let trajectory = SimTrajectory::circle(0.0, 0.0, sim.radius_m, sim.angular_speed);
    let poses = Arc::new(PoseBuffer::new(cfg.pose_cache()));
    let producer = tokio::spawn(produce_poses(poses.clone(), trajectory, start, frame_period, period));

    let bus = EventBus::default();
    let listener = tokio::spawn(report_progress(bus.subscribe_to(Topic::MapUpdates)));

    let mut camera = SimCamera::new("sim_down", sim.frame_width, sim.frame_height, start)
        .with_period(frame_period)
        .with_encoding(sim.encoding);
    if sim.frame_count > 0 {
        camera = camera.with_frame_count(sim.frame_count);
    }

    println!(
        "  Mapping {}×{} canvas at {} m/px; press {} to stop.\n",
        cfg.map.width,
        cfg.map.height,
        cfg.map.meters_per_pixel,
        "Ctrl-C".bold()
    );

    let result = {
        let mut builder = MapBuilder::new(cfg.builder_config(), poses)?.with_bus(bus);
        run_session(&mut camera, &mut builder, &shutdown).await
    };

    producer.abort();
    // The builder held the only bus, so the listener sees the channel close
    // once it has drained the backlog.
    if let Err(e) = listener.await {
        warn!(error = %e, "progress reporter ended abnormally");
    }
    result
}

/// Publish the simulated pose for every frame period, in real time.
async fn produce_poses(
    poses: Arc<PoseBuffer>,
    trajectory: SimTrajectory,
    start: chrono::DateTime<Utc>,
    frame_period: chrono::Duration,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    let mut stamp = start;
    loop {
        ticker.tick().await;
        poses.insert(StampedPose::new(stamp, trajectory.pose_at(start, stamp)));
        stamp += frame_period;
    }
}

/// Print one line per frame outcome published on the bus.
async fn report_progress(mut updates: TopicReceiver) {
    let mut frame = 0u64;
    loop {
        match updates.recv().await {
            Ok(event) => {
                frame += 1;
                match event.payload {
                    MapEventPayload::FrameComposited {
                        pose,
                        pixel_x,
                        pixel_y,
                        raised_pixels,
                        ..
                    } => println!(
                        "  {} #{frame:<5} ({:+.3}, {:+.3}) m → px ({pixel_x}, {pixel_y}), {raised_pixels} px raised",
                        "✓".green(),
                        pose.x,
                        pose.y,
                    ),
                    MapEventPayload::FrameSkipped { reason, .. } => {
                        println!("  {} #{frame:<5} skipped: {reason}", "·".yellow())
                    }
                    // Session notices travel on the diagnostics topic.
                    _ => {}
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                warn!(missed = n, "progress reporter fell behind");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
    info!(frames = frame, "progress reporter finished");
}

fn print_summary(summary: &SessionSummary) {
    let stats = &summary.stats;
    let ended = match summary.stop {
        StopReason::SourceExhausted => "camera stream ended",
        StopReason::ShutdownRequested => "stopped by operator",
    };
    println!();
    println!("  {} ({ended})", "Session summary".bold());
    println!("    frames received    {}", stats.received);
    println!("    composited         {}", stats.composited.to_string().green());
    println!("    skipped            {}", stats.skipped().to_string().yellow());
    println!("      conversion       {}", stats.skipped_conversion);
    println!("      pose unavailable {}", stats.skipped_pose);
    println!("      off map          {}", stats.skipped_off_map);
    println!("      warm-up          {}", stats.skipped_warmup);
    println!("    canvas coverage    {:.2}%", summary.coverage * 100.0);
    println!();
}

fn print_banner() {
    println!();
    println!("{}", r#"                          ____              "#.bold().cyan());
    println!("{}", r#"   ____ ___  ____ _____  / __/_  __________ "#.bold().cyan());
    println!("{}", r#"  / __ `__ \/ __ `/ __ \/ /_/ / / / ___/ _ \"#.bold().cyan());
    println!("{}", r#" / / / / / / /_/ / /_/ / __/ /_/ (__  )  __/"#.bold().cyan());
    println!("{}", r#"/_/ /_/ /_/\__,_/ .___/_/  \__,_/____/\___/ "#.bold().cyan());
    println!("{}", r#"               /_/                          "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "mapfuse".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Pose-registered image mosaicking");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> impl Iterator<Item = String> {
        items.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn no_arguments_means_defaults() {
        assert_eq!(parse_args(argv(&[])).unwrap(), Args::default());
    }

    #[test]
    fn config_flag_takes_a_path() {
        let args = parse_args(argv(&["--config", "/tmp/map.toml"])).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/map.toml")));
        assert!(parse_args(argv(&["-c"])).is_err());
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let err = parse_args(argv(&["--fast"])).unwrap_err();
        assert!(err.contains("--fast"));
    }

    #[tokio::test(start_paused = true)]
    async fn short_simulated_session_composites_every_frame() {
        let mut cfg = Config::default();
        cfg.sim.frame_count = 5;
        cfg.sim.frame_width = 16;
        cfg.sim.frame_height = 12;

        let summary = run(&cfg, Arc::new(AtomicBool::new(false))).await.unwrap();
        assert_eq!(summary.stop, StopReason::SourceExhausted);
        assert_eq!(summary.stats.composited, 5);
        assert!(summary.coverage > 0.0);
    }
}

//! End-to-end sessions on the simulated camera and trajectory.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mapfuse_hal::sim::{SimCamera, SimTrajectory};
use mapfuse_middleware::{EventBus, PoseBuffer, Topic};
use mapfuse_runtime::{MapBuilder, MapBuilderConfig, StopReason, run_session};
use mapfuse_types::{ImageEncoding, MapEventPayload, SkipReason, StampedPose};

const PERIOD_MS: i64 = 100;

/// Publish `count` trajectory samples, one per period of (virtual) time.
fn spawn_pose_producer(
    poses: Arc<PoseBuffer>,
    trajectory: SimTrajectory,
    start: DateTime<Utc>,
    count: i64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        for k in 0..count {
            let stamp = start + chrono::Duration::milliseconds(k * PERIOD_MS);
            poses.insert(StampedPose::new(stamp, trajectory.pose_at(start, stamp)));
            tokio::time::sleep(Duration::from_millis(PERIOD_MS as u64)).await;
        }
    })
}

fn camera(start: DateTime<Utc>, frames: u64) -> SimCamera {
    SimCamera::new("sim_down", 64, 48, start)
        .with_period(chrono::Duration::milliseconds(PERIOD_MS))
        .with_frame_count(frames)
}

#[tokio::test(start_paused = true)]
async fn circle_session_composites_every_frame() -> Result<(), Box<dyn std::error::Error>> {
    let start = Utc::now();
    let trajectory = SimTrajectory::circle(0.0, 0.0, 0.5, 0.5);
    let poses = Arc::new(PoseBuffer::default());
    let producer = spawn_pose_producer(poses.clone(), trajectory, start, 40);

    let bus = EventBus::default();
    let mut updates = bus.subscribe_to(Topic::MapUpdates);
    let mut builder = MapBuilder::new(MapBuilderConfig::default(), poses.clone())?.with_bus(bus);
    let mut source = camera(start, 40).with_encoding(ImageEncoding::Rgb8);

    let summary = run_session(&mut source, &mut builder, &AtomicBool::new(false)).await?;
    producer.await?;

    assert_eq!(summary.stop, StopReason::SourceExhausted);
    assert_eq!(summary.stats.received, 40);
    assert_eq!(summary.stats.composited, 40);
    assert_eq!(summary.stats.skipped(), 0);
    assert!(summary.coverage > 0.0);

    // The first pose is (0.5 m, 0) → 200 px right of the origin.
    let snap = builder.canvas().snapshot();
    assert_ne!(snap.get_pixel(700, 500)[0], 0);
    assert_eq!(snap.get_pixel(0, 0)[0], 0);

    let mut composited = 0;
    while let Ok(event) = updates.try_recv() {
        if composited == 0 {
            let json = serde_json::to_string(&event)?;
            assert!(json.contains("FrameComposited"), "{json}");
        }
        assert!(matches!(event.payload, MapEventPayload::FrameComposited { .. }));
        composited += 1;
    }
    assert_eq!(composited, 40);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn frames_outrunning_the_pose_stream_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let start = Utc::now();
    let trajectory = SimTrajectory::circle(0.0, 0.0, 0.2, 1.0);
    let poses = Arc::new(PoseBuffer::default());
    let producer = spawn_pose_producer(poses.clone(), trajectory, start, 10);

    let bus = EventBus::default();
    let mut updates = bus.subscribe_to(Topic::MapUpdates);
    let mut builder = MapBuilder::new(MapBuilderConfig::default(), poses.clone())?.with_bus(bus);
    let mut source = camera(start, 20);

    let summary = run_session(&mut source, &mut builder, &AtomicBool::new(false)).await?;
    producer.await?;

    assert_eq!(summary.stats.composited, 10);
    assert_eq!(summary.stats.skipped_pose, 10);

    let skipped = std::iter::from_fn(|| updates.try_recv().ok())
        .filter(|e| {
            matches!(
                e.payload,
                MapEventPayload::FrameSkipped {
                    reason: SkipReason::PoseUnavailable,
                    ..
                }
            )
        })
        .count();
    assert_eq!(skipped, 10);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn warmup_consumes_leading_frames() -> Result<(), Box<dyn std::error::Error>> {
    let start = Utc::now();
    let poses = Arc::new(PoseBuffer::default());
    let producer = spawn_pose_producer(poses.clone(), SimTrajectory::circle(0.0, 0.0, 0.0, 0.0), start, 5);

    let config = MapBuilderConfig {
        warmup_frames: 3,
        ..MapBuilderConfig::default()
    };
    let mut builder = MapBuilder::new(config, poses.clone())?;
    let mut source = camera(start, 5);

    let summary = run_session(&mut source, &mut builder, &AtomicBool::new(false)).await?;
    producer.await?;

    assert_eq!(summary.stats.skipped_warmup, 3);
    assert_eq!(summary.stats.composited, 2);
    Ok(())
}

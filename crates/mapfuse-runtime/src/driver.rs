//! Session driver: pulls frames from an [`ImageSource`] and feeds them to a
//! [`MapBuilder`] until the source ends, shutdown is requested, or a fatal
//! error occurs.
//!
//! When the builder carries an [`EventBus`][mapfuse_middleware::EventBus],
//! the session start, its end and any fatal error are published on
//! [`Topic::Diagnostics`].

use std::sync::atomic::{AtomicBool, Ordering};

use mapfuse_hal::ImageSource;
use mapfuse_middleware::Topic;
use mapfuse_types::{MapError, MapEvent, MapEventPayload};
use tracing::{error, info, instrument, warn};

use crate::map_builder::{MapBuilder, PipelineStats};

/// Event `source` tag for session notices.
const EVENT_SOURCE: &str = "mapfuse-runtime::driver";

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The image source reported end of stream.
    SourceExhausted,
    /// The shutdown flag was raised.
    ShutdownRequested,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::SourceExhausted => "source_exhausted",
            StopReason::ShutdownRequested => "shutdown_requested",
        }
    }
}

/// What a finished session produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    pub stats: PipelineStats,
    /// Fraction of canvas pixels holding evidence at the end.
    pub coverage: f64,
    pub stop: StopReason,
}

/// Drive `builder` with every frame `source` yields.
///
/// `shutdown` is checked before each frame; a frame already in the pipeline
/// always completes.
///
/// # Errors
///
/// Returns the first fatal error, from either the source or the pipeline
/// (for example a sensor resolution change).  Non-fatal read errors from the
/// source are logged and the source is polled again after yielding to the
/// runtime.
#[instrument(skip_all, fields(source = source.id()))]
pub async fn run_session<S>(
    source: &mut S,
    builder: &mut MapBuilder,
    shutdown: &AtomicBool,
) -> Result<SessionSummary, MapError>
where
    S: ImageSource + ?Sized,
{
    info!("mapping session started");
    announce(
        builder,
        MapEventPayload::SessionStarted {
            image_source: source.id().to_string(),
        },
    );

    let stop = match pump(source, builder, shutdown).await {
        Ok(stop) => stop,
        Err(err) => {
            error!(%err, "mapping session aborted");
            announce(builder, MapEventPayload::SessionFailed { error: err.clone() });
            return Err(err);
        }
    };

    let stats = builder.stats();
    let coverage = builder.canvas().read(|c| c.coverage());
    info!(
        ?stop,
        received = stats.received,
        composited = stats.composited,
        skipped = stats.skipped(),
        coverage,
        "mapping session finished"
    );
    announce(
        builder,
        MapEventPayload::SessionStopped {
            reason: stop.as_str().to_string(),
            received: stats.received,
            composited: stats.composited,
            coverage,
        },
    );
    Ok(SessionSummary {
        stats,
        coverage,
        stop,
    })
}

async fn pump<S>(
    source: &mut S,
    builder: &mut MapBuilder,
    shutdown: &AtomicBool,
) -> Result<StopReason, MapError>
where
    S: ImageSource + ?Sized,
{
    loop {
        if shutdown.load(Ordering::Acquire) {
            return Ok(StopReason::ShutdownRequested);
        }
        let raw = match source.next_frame() {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(StopReason::SourceExhausted),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(%err, "image source read failed");
                // A source that keeps failing must not starve other tasks.
                tokio::task::yield_now().await;
                continue;
            }
        };
        builder.process(&raw).await?;
    }
}

fn announce(builder: &MapBuilder, payload: MapEventPayload) {
    if let Some(bus) = builder.bus() {
        // No subscribers is not an error.
        let _ = bus.publish_to(Topic::Diagnostics, MapEvent::new(EVENT_SOURCE, payload));
    }
}

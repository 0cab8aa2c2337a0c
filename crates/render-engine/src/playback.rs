//! Display-refresh driven preview loop.

use reframe_common::clock::{RateController, SessionClock};
use reframe_common::ReframeResult;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::compositor::{CompositeMode, CompositionRequest, CompositionResult, Compositor, Session};
use crate::source::{DecodeSource, DecodedFrame, PreviewSurface};

/// Default preview refresh rate.
pub const DEFAULT_REFRESH_HZ: u32 = 60;

/// Why a preview run returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStop {
    /// The source was paused or never started.
    Paused,
    /// Playback reached the end of the trim window or the media.
    Ended,
    /// The session asked the driver to stop.
    Stopped,
}

/// Counters for one preview run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackStats {
    pub presented: u64,
    /// Ticks whose frame had not been decoded yet.
    pub skipped: u64,
    pub reason: PlaybackStop,
}

/// Re-composites the preview once per display refresh while the decode
/// source plays.
#[derive(Debug)]
pub struct PlaybackDriver {
    rate: RateController,
    compositor: Compositor,
    clock: SessionClock,
}

impl PlaybackDriver {
    pub fn new(refresh_hz: u32) -> Self {
        Self {
            rate: RateController::new(refresh_hz),
            compositor: Compositor::new(),
            clock: SessionClock::start(),
        }
    }

    /// Start a new recording/editing session: fresh clock and click state.
    pub fn reset(&mut self) {
        self.compositor.reset();
        self.clock = SessionClock::start();
    }

    /// Composite a single preview frame, e.g. after a scrub. `None` when the
    /// frame is not decoded yet.
    pub fn preview_frame(
        &mut self,
        session: &Session,
        frame: Option<&DecodedFrame>,
        time: f64,
    ) -> ReframeResult<Option<CompositionResult>> {
        let request = CompositionRequest::new(session, frame, time, CompositeMode::Preview)?;
        self.compositor.composite(&request, &self.clock)
    }

    /// Drive the preview until the source stops playing, the trim window
    /// ends, or `stop` fires. Never draws after returning.
    pub async fn run<S, P>(
        &mut self,
        source: &mut S,
        surface: &mut P,
        session: &Session,
        stop: &CancellationToken,
    ) -> ReframeResult<PlaybackStats>
    where
        S: DecodeSource + ?Sized,
        P: PreviewSurface + ?Sized,
    {
        let mut ticker = tokio::time::interval(self.rate.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let trim_end = session.segment().trim_end;
        let (mut presented, mut skipped) = (0u64, 0u64);

        let reason = loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break PlaybackStop::Stopped,
                _ = ticker.tick() => {}
            }
            if source.has_ended() {
                break PlaybackStop::Ended;
            }
            if !source.is_playing() {
                break PlaybackStop::Paused;
            }
            let time = source.current_time();
            if time >= trim_end {
                source.pause();
                break PlaybackStop::Ended;
            }

            let frame = source.current_frame();
            match self.preview_frame(session, frame.as_ref(), time)? {
                Some(result) => {
                    surface.present(&result)?;
                    presented += 1;
                }
                None => skipped += 1,
            }
        };

        tracing::debug!(presented, skipped, reason = ?reason, "Preview loop stopped");
        Ok(PlaybackStats {
            presented,
            skipped,
            reason,
        })
    }
}

impl Default for PlaybackDriver {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_HZ)
    }
}

//! Animation-frame scheduling.
//!
//! A frame callback runs only when one was requested; requests made
//! while one is already pending collapse into a single callback.

use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

pub trait FrameScheduler {
    /// Ask for one more frame callback.
    fn request_frame(&mut self);
}

/// Fixed-rate frame clock driven by a Tokio interval.
pub struct AnimationFrames {
    interval: Interval,
    pending: bool,
}

impl AnimationFrames {
    pub fn new(rate_hz: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / rate_hz.max(1) as f64);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval,
            pending: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Wait for the next frame boundary and consume the pending request.
    /// Cancel-safe: the request stays pending if this future is dropped.
    pub async fn next_frame(&mut self) {
        self.interval.tick().await;
        self.pending = false;
    }
}

impl FrameScheduler for AnimationFrames {
    fn request_frame(&mut self) {
        self.pending = true;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::FrameScheduler;

    /// Counts requests; the test drives callbacks by hand.
    #[derive(Default)]
    pub struct ManualFrames {
        pub requests: usize,
    }

    impl FrameScheduler for ManualFrames {
        fn request_frame(&mut self) {
            self.requests += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_then_consume() {
        let mut frames = AnimationFrames::new(60);
        assert!(!frames.is_pending());

        frames.request_frame();
        frames.request_frame();
        assert!(frames.is_pending());

        frames.next_frame().await;
        assert!(!frames.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_period() {
        let mut frames = AnimationFrames::new(50);
        // First tick completes immediately
        frames.next_frame().await;
        let start = tokio::time::Instant::now();
        frames.request_frame();
        frames.next_frame().await;
        assert_eq!(start.elapsed(), Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_zero_rate_clamped() {
        let mut frames = AnimationFrames::new(0);
        frames.request_frame();
        frames.next_frame().await;
        assert!(!frames.is_pending());
    }
}

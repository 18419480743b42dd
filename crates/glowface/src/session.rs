//! Capture session: the webcam toggle and the per-frame detection loop.
//!
//! All session state lives here and is only touched from frame callbacks
//! and control activations, which the caller serializes.

use crate::page::{ControlLabel, Page};
use crate::scheduler::FrameScheduler;
use crate::video::{ReadyState, VideoElement};
use glowface_core::{BlendshapeDetector, ExpressionScores, GlowMachine, GlowTransition};
use glowface_hw::{MediaConstraints, MediaDevices, MediaStream};
use std::time::Instant;

/// What a single frame callback did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// No usable video data yet.
    NotReady,
    /// Playback time unchanged since the last processed frame.
    Unchanged,
    DetectorFailed,
    NoFace,
    /// The face lacked one of the two expression categories.
    MissingCategories,
    Scored {
        scores: ExpressionScores,
        transition: Option<GlowTransition>,
    },
}

pub struct CaptureSession<D, S, P> {
    detector: Option<D>,
    running: bool,
    video: VideoElement<S>,
    last_video_time: Option<f64>,
    glow: GlowMachine,
    page: P,
    epoch: Instant,
}

impl<D, S, P> CaptureSession<D, S, P>
where
    D: BlendshapeDetector,
    S: MediaStream,
    P: Page,
{
    /// Start with the control disabled until a detector arrives.
    pub fn new(mut page: P) -> Self {
        page.set_control(ControlLabel::Loading, false);
        Self {
            detector: None,
            running: false,
            video: VideoElement::new(),
            last_video_time: None,
            glow: GlowMachine::new(),
            page,
            epoch: Instant::now(),
        }
    }

    /// Install the initialized detector and enable the control.
    pub fn detector_ready(&mut self, detector: D) {
        self.detector = Some(detector);
        self.page.set_control(ControlLabel::Enable, true);
        tracing::info!("face landmarker ready");
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[cfg(test)]
    pub fn glow_state(&self) -> glowface_core::GlowState {
        self.glow.state()
    }

    #[cfg(test)]
    pub fn page(&self) -> &P {
        &self.page
    }

    /// Handle a control activation: start capture when idle, stop it when running.
    pub async fn toggle<M, F>(&mut self, media: &mut M, frames: &mut F)
    where
        M: MediaDevices<Stream = S>,
        F: FrameScheduler,
    {
        if self.detector.is_none() {
            tracing::warn!("Wait! face landmarker not loaded yet.");
            return;
        }

        self.running = !self.running;
        let label = if self.running {
            ControlLabel::Disable
        } else {
            ControlLabel::Enable
        };
        self.page.set_control(label, true);

        if !self.running {
            self.stop_capture();
            return;
        }

        match media.get_user_media(MediaConstraints::video_only()).await {
            Ok(stream) => {
                self.video.attach(stream);
                self.last_video_time = None;
                tracing::info!("webcam enabled");
                frames.request_frame();
            }
            Err(e) => {
                tracing::error!(error = %e, "error accessing webcam");
                self.running = false;
                self.page.set_control(ControlLabel::Enable, true);
            }
        }
    }

    /// Release the stream and reset the overlay unconditionally.
    fn stop_capture(&mut self) {
        if let Some(mut stream) = self.video.detach() {
            stream.stop_tracks();
        }
        self.page.hide_overlay();
        self.glow.reset();
        tracing::info!("webcam disabled");
    }

    /// Frame callback: detect on a fresh frame, then reschedule while capturing.
    pub fn on_animation_frame<F: FrameScheduler>(&mut self, frames: &mut F) -> FrameOutcome {
        let outcome = self.process_frame();
        tracing::trace!(?outcome, "frame");
        if self.running {
            frames.request_frame();
        }
        outcome
    }

    fn process_frame(&mut self) -> FrameOutcome {
        if self.video.ready_state() < ReadyState::HaveCurrentData {
            return FrameOutcome::NotReady;
        }
        let Some(frame) = self.video.current_frame() else {
            return FrameOutcome::NotReady;
        };

        let video_time = self.video.frame_time(&frame);
        if self.last_video_time == Some(video_time) {
            return FrameOutcome::Unchanged;
        }
        self.last_video_time = Some(video_time);

        let Some(detector) = self.detector.as_mut() else {
            return FrameOutcome::NotReady;
        };
        let timestamp_ms = self.epoch.elapsed().as_secs_f64() * 1000.0;
        let result =
            match detector.detect_for_video(&frame.data, frame.width, frame.height, timestamp_ms) {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(error = %e, video_time, "detection failed; skipping frame");
                    return FrameOutcome::DetectorFailed;
                }
            };

        let Some(face) = result.first_face() else {
            return FrameOutcome::NoFace;
        };
        tracing::trace!(categories = ?face.categories, "face blendshapes");

        let Some(scores) = ExpressionScores::from_blendshapes(face) else {
            tracing::debug!("pucker or shrug category missing from result");
            return FrameOutcome::MissingCategories;
        };

        self.page.set_shrug_value(&format!("{:.2}", scores.shrug));
        self.page.set_pucker_value(&format!("{:.2}", scores.pucker));

        let transition = self.glow.update(scores);
        match transition {
            Some(GlowTransition::TurnedOn) => self.page.show_overlay(),
            Some(GlowTransition::TurnedOff) => self.page.hide_overlay(),
            None => {}
        }

        FrameOutcome::Scored { scores, transition }
    }

    /// Teardown: release any open stream.
    pub fn shutdown(&mut self) {
        if self.video.has_source() {
            self.running = false;
            self.stop_capture();
        }
    }
}

//! Media capture boundary: devices hand out streams, streams own tracks.
//!
//! A stream must release its device when every track is stopped; the
//! camera implementation also stops its tracks on drop.

use crate::frame::Frame;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("no capture device: {0}")]
    NotFound(String),
    #[error("capture device could not be read: {0}")]
    NotReadable(String),
    #[error("constraints not supported: {0}")]
    NotSupported(String),
}

impl From<crate::camera::CameraError> for MediaError {
    fn from(err: crate::camera::CameraError) -> Self {
        use crate::camera::CameraError;
        match err {
            CameraError::DeviceNotFound(dev) => MediaError::NotFound(dev),
            other => MediaError::NotReadable(other.to_string()),
        }
    }
}

/// What a caller asks the device for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: bool,
    pub audio: bool,
}

impl MediaConstraints {
    pub fn video_only() -> Self {
        Self {
            video: true,
            audio: false,
        }
    }

    /// Only video-only requests can be served.
    pub fn validate(&self) -> Result<(), MediaError> {
        if self.audio {
            return Err(MediaError::NotSupported("audio capture".into()));
        }
        if !self.video {
            return Err(MediaError::NotSupported("no media kind requested".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Live,
    Ended,
}

pub trait MediaTrack {
    fn kind(&self) -> TrackKind;
    fn label(&self) -> &str;
    fn state(&self) -> TrackState;
    /// Release the track's source. Idempotent.
    fn stop(&mut self);
}

pub trait MediaStream {
    type Track: MediaTrack;

    fn tracks(&self) -> &[Self::Track];
    fn tracks_mut(&mut self) -> &mut [Self::Track];
    /// Most recent decoded video frame, if any has arrived yet.
    fn latest_frame(&self) -> Option<Arc<Frame>>;
    /// Origin of the stream's playback clock.
    fn started_at(&self) -> Instant;

    fn stop_tracks(&mut self) {
        for track in self.tracks_mut() {
            track.stop();
        }
    }
}

/// Source of media streams (the camera side of `getUserMedia`).
#[allow(async_fn_in_trait)]
pub trait MediaDevices {
    type Stream: MediaStream;

    async fn get_user_media(
        &mut self,
        constraints: MediaConstraints,
    ) -> Result<Self::Stream, MediaError>;
}

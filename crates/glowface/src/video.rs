//! Video sink: holds the attached stream and answers readiness and
//! playback-time queries the way a `<video>` element would.

use glowface_hw::{Frame, MediaStream};
use std::sync::Arc;

/// Buffered-data level of the video sink, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveEnoughData,
}

pub struct VideoElement<S> {
    src_object: Option<S>,
}

impl<S> Default for VideoElement<S> {
    fn default() -> Self {
        Self { src_object: None }
    }
}

impl<S: MediaStream> VideoElement<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a stream as the source. A previously attached stream is stopped.
    pub fn attach(&mut self, stream: S) {
        if let Some(mut old) = self.src_object.replace(stream) {
            old.stop_tracks();
        }
    }

    /// Detach the current stream and hand it back to the caller.
    pub fn detach(&mut self) -> Option<S> {
        self.src_object.take()
    }

    pub fn has_source(&self) -> bool {
        self.src_object.is_some()
    }

    pub fn ready_state(&self) -> ReadyState {
        match &self.src_object {
            None => ReadyState::HaveNothing,
            Some(stream) if stream.latest_frame().is_some() => ReadyState::HaveEnoughData,
            Some(_) => ReadyState::HaveMetadata,
        }
    }

    pub fn current_frame(&self) -> Option<Arc<Frame>> {
        self.src_object.as_ref()?.latest_frame()
    }

    /// Playback position of `frame` in seconds since the stream started.
    pub fn frame_time(&self, frame: &Frame) -> f64 {
        self.src_object
            .as_ref()
            .map(|s| frame.timestamp.saturating_duration_since(s.started_at()).as_secs_f64())
            .unwrap_or(0.0)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FrameFeed;
    use super::*;
    use glowface_hw::{MediaTrack, TrackState};

    #[test]
    fn test_empty_element() {
        let video: VideoElement<super::testing::FakeStream> = VideoElement::new();
        assert_eq!(video.ready_state(), ReadyState::HaveNothing);
        assert!(video.current_frame().is_none());
    }

    #[test]
    fn test_ready_after_first_frame() {
        let feed = FrameFeed::new();
        let mut video = VideoElement::new();
        video.attach(feed.stream());
        assert_eq!(video.ready_state(), ReadyState::HaveMetadata);
        assert!(video.ready_state() < ReadyState::HaveCurrentData);

        feed.push(500);
        assert!(video.ready_state() >= ReadyState::HaveCurrentData);
        let frame = video.current_frame().unwrap();
        assert!((video.frame_time(&frame) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_attach_replaces_and_stops_old_stream() {
        let first = FrameFeed::new();
        let second = FrameFeed::new();
        let mut video = VideoElement::new();
        video.attach(first.stream());
        video.attach(second.stream());
        assert!(first.is_stopped());
        assert!(!second.is_stopped());
    }

    #[test]
    fn test_detach_returns_stream() {
        let feed = FrameFeed::new();
        let mut video = VideoElement::new();
        video.attach(feed.stream());
        let stream = video.detach().unwrap();
        assert!(!video.has_source());
        assert_eq!(stream.tracks()[0].state(), TrackState::Live);
    }
}

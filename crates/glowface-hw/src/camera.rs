//! V4L2 camera capture via the `v4l` crate.
//!
//! `Camera::open` negotiates a format; `CameraStream::start` hands the
//! camera to a capture thread that publishes the latest RGB frame.

use crate::frame::{self, Frame};
use crate::stream::{
    MediaConstraints, MediaDevices, MediaError, MediaStream, MediaTrack, TrackKind, TrackState,
};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::io;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const CAPTURE_WIDTH: u32 = 640;
const CAPTURE_HEIGHT: u32 = 480;
const CAPTURE_BUFFERS: u32 = 4;
/// Upper bound on one dequeue wait, so a stalled camera still sees `stop`.
const CAPTURE_POLL_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// 8-bit grayscale.
    Grey,
    /// 16-bit little-endian grayscale.
    Y16,
}

/// V4L2 camera device handle.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub name: String,
    pixel_format: PixelFormat,
    /// Bytes per row as reported by the driver.
    stride: usize,
}

impl Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0").
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        // Ask for YUYV; accept GREY or Y16 if the driver insists.
        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;

        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = CAPTURE_WIDTH;
        fmt.height = CAPTURE_HEIGHT;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let fourcc = negotiated.fourcc;
        let pixel_format = if fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else if fourcc == FourCC::new(b"GREY") {
            PixelFormat::Grey
        } else if fourcc == FourCC::new(b"Y16 ") || fourcc == FourCC::new(b"Y16\0") {
            PixelFormat::Y16
        } else {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {fourcc:?} (need YUYV, GREY, or Y16)"
            )));
        };

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            stride = negotiated.stride,
            fourcc = ?fourcc,
            "negotiated format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            name: caps.card,
            pixel_format,
            stride: negotiated.stride as usize,
        })
    }

    /// Convert a raw buffer to RGB based on the negotiated format.
    fn buf_to_rgb(&self, buf: &[u8]) -> Result<Vec<u8>, CameraError> {
        let converted = match self.pixel_format {
            PixelFormat::Yuyv => frame::yuyv_to_rgb(buf, self.width, self.height, self.stride),
            PixelFormat::Grey => frame::grey_to_rgb(buf, self.width, self.height, self.stride),
            PixelFormat::Y16 => frame::y16_to_rgb(buf, self.width, self.height, self.stride),
        };
        converted.map_err(|e| {
            CameraError::CaptureFailed(format!("{:?} conversion failed: {e}", self.pixel_format))
        })
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

/// A live video track backed by a capture thread.
pub struct CameraTrack {
    label: String,
    stop: Arc<AtomicBool>,
    frames: watch::Receiver<Option<Arc<Frame>>>,
    worker: Option<JoinHandle<()>>,
}

impl CameraTrack {
    fn spawn(camera: Camera) -> Result<Self, CameraError> {
        let label = format!("{} ({})", camera.name, camera.device_path);
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, frames) = watch::channel(None);

        let worker_stop = Arc::clone(&stop);
        let worker = std::thread::Builder::new()
            .name("glowface-capture".into())
            .spawn(move || capture_loop(camera, worker_stop, tx))
            .map_err(|e| CameraError::CaptureFailed(format!("failed to spawn capture thread: {e}")))?;

        Ok(Self {
            label,
            stop,
            frames,
            worker: Some(worker),
        })
    }
}

impl MediaTrack for CameraTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn state(&self) -> TrackState {
        match &self.worker {
            Some(worker) if !worker.is_finished() => TrackState::Live,
            _ => TrackState::Ended,
        }
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.stop.store(true, Ordering::Release);
        if worker.join().is_err() {
            tracing::warn!(track = %self.label, "capture thread panicked");
        }
        tracing::info!(track = %self.label, "track stopped");
    }
}

/// Dequeue frames until asked to stop. The device closes when `camera` drops.
fn capture_loop(camera: Camera, stop: Arc<AtomicBool>, tx: watch::Sender<Option<Arc<Frame>>>) {
    let mut stream =
        match MmapStream::with_buffers(&camera.device, BufType::VideoCapture, CAPTURE_BUFFERS) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(device = %camera.device_path, error = %e, "failed to create mmap stream");
                return;
            }
        };
    stream.set_timeout(CAPTURE_POLL_TIMEOUT);

    tracing::debug!(device = %camera.device_path, "capture thread started");

    let result = pump(&stop, || {
        let (buf, meta) = stream.next()?;
        match camera.buf_to_rgb(buf) {
            Ok(rgb) => {
                tx.send_replace(Some(Arc::new(Frame {
                    data: rgb,
                    width: camera.width,
                    height: camera.height,
                    timestamp: Instant::now(),
                    sequence: meta.sequence,
                })));
            }
            Err(e) => tracing::debug!(seq = meta.sequence, error = %e, "dropping frame"),
        }
        Ok(())
    });

    if let Err(e) = result {
        tracing::warn!(device = %camera.device_path, error = %e, "failed to dequeue buffer");
    }
    tracing::debug!(device = %camera.device_path, "capture thread exiting");
}

/// Run `step` until `stop` is set. A timed-out dequeue only means no frame
/// arrived yet; any other error ends the loop.
fn pump(stop: &AtomicBool, mut step: impl FnMut() -> io::Result<()>) -> io::Result<()> {
    while !stop.load(Ordering::Acquire) {
        match step() {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                tracing::trace!("no frame within poll timeout");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Stream with a single camera video track.
pub struct CameraStream {
    tracks: Vec<CameraTrack>,
    started_at: Instant,
}

impl CameraStream {
    pub fn start(camera: Camera) -> Result<Self, CameraError> {
        let started_at = Instant::now();
        let track = CameraTrack::spawn(camera)?;
        Ok(Self {
            tracks: vec![track],
            started_at,
        })
    }
}

impl MediaStream for CameraStream {
    type Track = CameraTrack;

    fn tracks(&self) -> &[CameraTrack] {
        &self.tracks
    }

    fn tracks_mut(&mut self) -> &mut [CameraTrack] {
        &mut self.tracks
    }

    fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.tracks
            .iter()
            .find(|t| t.kind() == TrackKind::Video)
            .and_then(|t| t.frames.borrow().clone())
    }

    fn started_at(&self) -> Instant {
        self.started_at
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

/// `getUserMedia` over a fixed V4L2 device.
pub struct V4lMediaDevices {
    device_path: String,
}

impl V4lMediaDevices {
    pub fn new(device_path: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
        }
    }
}

impl MediaDevices for V4lMediaDevices {
    type Stream = CameraStream;

    async fn get_user_media(
        &mut self,
        constraints: MediaConstraints,
    ) -> Result<CameraStream, MediaError> {
        constraints.validate()?;

        let path = self.device_path.clone();
        let camera = tokio::task::spawn_blocking(move || Camera::open(&path))
            .await
            .map_err(|e| MediaError::NotReadable(format!("camera open task failed: {e}")))??;

        Ok(CameraStream::start(camera)?)
    }
}

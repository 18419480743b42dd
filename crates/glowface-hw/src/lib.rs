//! glowface-hw: camera capture for the glowface demo.
//!
//! Provides V4L2-based camera streams behind a small media boundary
//! (devices, streams, tracks) and RGB frame conversion.

pub mod camera;
pub mod frame;
pub mod stream;

pub use camera::{Camera, CameraError, CameraStream, DeviceInfo, PixelFormat, V4lMediaDevices};
pub use frame::Frame;
pub use stream::{
    MediaConstraints, MediaDevices, MediaError, MediaStream, MediaTrack, TrackKind, TrackState,
};

//! Frame ingestion.
//!
//! - USB/V4L2 webcams (feature: camera-v4l2)
//! - `stub://` synthetic camera (testing, demos)
//!
//! Every source hands out packed RGB24 `Frame`s; pixel format conversion happens here
//! and nowhere else.

pub mod camera;
mod normalize;

pub use camera::CameraSource;

//! Smart Scale
//!
//! A checkout scale that identifies produce with a camera, reads its weight over a
//! serial link, and prices it per kilogram, plus offline tools to evaluate the detector
//! on a labeled image set.
//!
//! # Pipelines
//!
//! - **Live** (`scale_live`): scale poll → frame capture → detection → stability filter
//!   → pricing → overlay. A label is only shown and priced after it has been the top
//!   detection continuously for the stability window.
//! - **Offline** (`batch_classify`, `threshold_sweep`): classify a labeled image
//!   directory into a CSV table, then compute coverage and macro-F1 per confidence
//!   threshold.
//!
//! # Module Structure
//!
//! - `config`: TOML + environment configuration
//! - `frame`, `ingest`: RGB frames and camera sources
//! - `detect`: detector backends, YOLO decoding, top-detection selection
//! - `scale`: serial weight readings
//! - `stability`: the commit state machine
//! - `pricing`: per-kilogram price table
//! - `overlay`, `display`: annotated frames and where they are shown
//! - `session`: the live loop
//! - `eval`: batch classification and threshold sweep

pub mod config;
pub mod detect;
pub mod display;
pub mod eval;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod pricing;
pub mod scale;
pub mod session;
pub mod stability;

pub use config::ScaleConfig;
pub use detect::{load_backend, top_detection, Detection, DetectorBackend, Observation};
pub use frame::{Frame, FrameSource};
pub use ingest::CameraSource;
pub use pricing::PriceTable;
pub use scale::Scale;
pub use session::{LiveSession, SessionSummary, StopReason};
pub use stability::{CommitEvent, CommittedItem, StabilityFilter};

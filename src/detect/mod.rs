mod backend;
mod backends;
mod result;
mod select;
pub mod yolo;

pub use backend::{load_backend, DetectorBackend};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{BoundingBox, Detection, Observation, NO_ITEM_LABEL};
pub use select::top_detection;

mod backend;
pub mod backends;
mod registry;
mod result;

pub use backend::DetectorBackend;
pub use backends::{ReplayBackend, StubBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use registry::BackendRegistry;
pub use result::{filter_by_confidence, iou, non_max_suppression, Detection};

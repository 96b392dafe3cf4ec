//! Instance segmentation: detection, confidence filtering and overlay
//! compositing.

pub mod compositor;
pub mod detector;
pub mod filter;
pub mod maskrcnn;
pub(crate) mod palette;

pub use compositor::OverlayCompositor;
pub use detector::InstanceDetector;
pub use filter::SegmentationFilter;
pub use maskrcnn::MaskRcnnDetector;

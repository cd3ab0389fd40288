pub mod keypoint;
pub mod keys;
pub mod normalize;
pub mod template;

pub use keypoint::{KeypointMap, KeypointName, Vec2};
pub use keys::{key_display, key_kind, KeyKind, AVAILABLE_KEYS};
pub use normalize::{capture_to_relative, to_display, CanvasSize, DisplayPoints};
pub use template::{decode_catalog, CameraType, Catalog, PoseTemplate, RelativeVectors, TemplateShape};

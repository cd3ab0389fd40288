pub mod raster;
pub mod skeleton;
#[cfg(feature = "desktop")]
pub mod window;

pub use raster::Framebuffer;
pub use skeleton::{render_template, DrawPrimitive, MarkerRole, SKELETON_CONNECTIONS};
#[cfg(feature = "desktop")]
pub use minifb::Key;
#[cfg(feature = "desktop")]
pub use window::MinifbRenderer;

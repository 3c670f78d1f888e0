pub mod audio;

#[cfg(feature = "device")]
pub mod device;

#[cfg(feature = "device")]
pub use cpal;

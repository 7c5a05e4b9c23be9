//! Utility modules

pub mod crop;
pub mod enhance;
pub mod image;

pub use image::ImageUtils;

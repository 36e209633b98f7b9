//! Individual preprocessing steps

pub mod blur;
pub mod decode;
pub mod grayscale;
pub mod threshold;

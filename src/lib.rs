// Photomark library: text watermark rendering and batch export

pub mod batch;
pub mod config;
pub mod image_io;
pub mod logging;
pub mod templates;
pub mod watermark;

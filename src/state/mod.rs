//! Engine state: project metadata, per-image working data, and the
//! workstation facade that ties them together.

mod image_data;
mod project;
mod workstation;

pub use image_data::{ImageData, ImageDataStore};
pub use project::ProjectState;
pub use workstation::Workstation;

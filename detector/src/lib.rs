mod detector;
mod prediction_file;
mod yolo;

pub use detector::*;
pub use prediction_file::*;
pub use yolo::*;

mod ocr;
mod pp_ocr;

pub use ocr::*;
pub use pp_ocr::*;

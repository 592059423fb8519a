mod matcher;
pub mod sequence;

pub use matcher::*;

pub mod image;
pub mod utils;

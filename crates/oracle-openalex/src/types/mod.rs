pub mod common;
pub mod work;

pub use common::*;
pub use work::Work;

pub mod decode;
pub mod pipeline;
pub mod validate;

pub use decode::*;
pub use pipeline::*;
pub use validate::*;

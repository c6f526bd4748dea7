pub mod instrument;
pub mod run;

pub use instrument::*;
pub use run::*;

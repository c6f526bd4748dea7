pub mod sqlite;
pub mod traits;

pub use sqlite::*;
pub use traits::*;

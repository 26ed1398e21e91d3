pub mod engine;
pub mod highlight;
pub mod index;
pub mod lexical;
pub mod vector;

pub use engine::{BuildReport, Engine, IndexStats};

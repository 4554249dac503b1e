//! Intake Domain Types

mod assignment;
mod graph;
mod ids;
mod owner;
mod property;

pub use assignment::*;
pub use graph::*;
pub use ids::*;
pub use owner::*;
pub use property::*;

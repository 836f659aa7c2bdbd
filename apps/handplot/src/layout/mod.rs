// Layout: page geometry plus the persistent word-wrap cursor.
// Pure and synchronous; the coordinator runs it inside spawn_blocking with the rest of the pipeline.

pub mod engine;
pub mod page;

pub use engine::{LayoutEngine, LayoutSettings, Measure, TextExtent, WordPlacement};
pub use page::Page;

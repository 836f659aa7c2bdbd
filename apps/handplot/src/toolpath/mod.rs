// Toolpath: contour -> motion program translation and .nc file output.

pub mod program;
pub mod writer;

pub use program::{ToolSettings, ToolpathProgram};
pub use writer::{timestamp, write_program};

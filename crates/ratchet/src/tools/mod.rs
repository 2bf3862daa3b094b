//! A set of built-in tools that backends can call.

mod calc;
mod clock;
mod search;

pub use calc::CalcTool;
pub use clock::ClockTool;
pub use search::SearchTool;

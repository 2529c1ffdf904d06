mod allocation;
mod history;
mod input;
mod stats;

pub use allocation::*;
pub use history::*;
pub use input::*;
pub use stats::*;

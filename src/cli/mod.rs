//! CLI command handling

pub mod inbox;
pub mod output;
pub mod serve;

pub use inbox::*;
pub use output::*;
pub use serve::*;

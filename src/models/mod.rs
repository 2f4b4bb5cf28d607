//! Data models

mod audit;
mod caller;
mod dashboard;

pub use audit::*;
pub use caller::*;
pub use dashboard::*;

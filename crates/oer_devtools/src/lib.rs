pub mod dot;
pub mod statistics;

pub use dot::{save_dot, write_dot};
pub use statistics::{Statistics, StatsSnapshot};

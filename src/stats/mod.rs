pub mod reservoir;
pub mod running;

pub use reservoir::{quantile_interval, QuantileEstimate, Reservoir};
pub use running::{ConvergencePoint, RunningStatistics, Statistics, Transform, Z_95};

/// The `chaos_study` crate runs the pendulum flip and Lorenz studies on top of `chaos_core`.
///
/// - **Scenario**: serde-loadable run descriptions with the reference defaults.
/// - **Series**: sampled time series, flip statistics and the small helpers they use.
pub mod scenario;
pub mod series;

pub use scenario::{LorenzScenario, PendulumScenario};
pub use series::{
    event_gaps, flip_statistics, linspace, lorenz_series, pendulum_series, wrap_angle,
    FlipStatistics, LorenzSeries, PendulumSeries,
};

pub mod dense;
pub mod error;
pub mod events;
pub mod integrate;
pub mod solvers;
pub mod systems;
/// The `chaos_core` crate provides the integration engine used by the pendulum and Lorenz studies.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `DynamicalSystem` (ODE right-hand sides),
///   `EventFunction` (scalar indicators with a direction filter).
/// - **Systems**: the damped driven pendulum, the Lorenz system and the pendulum flip event.
/// - **Solvers**: the Dormand-Prince 5(4) pair, PI step control and the initial step estimate.
/// - **Dense output**: per-step interpolants answering state queries anywhere in the covered span.
/// - **Events**: sign-change detection refined with Brent's method.
/// - **Integrate**: the adaptive driver tying the above together.
pub mod traits;

pub use dense::{DenseSolution, Segment};
pub use error::IntegrationError;
pub use events::{EventHit, EventRecord};
pub use integrate::{
    integrate, integrate_dense, Integration, IntegrationStats, IntegratorSettings, Samples,
    Termination,
};
pub use systems::{FlipEvent, ForcedPendulum, Lorenz, LorenzParams, PendulumParams};
pub use traits::{DynamicalSystem, EventFunction, EventSample, Scalar};

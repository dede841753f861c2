//! Live match broadcast subsystem: connection hub, single write path, and
//! the simulation clock.

mod broadcaster;
mod hub;
mod simulation;

pub use broadcaster::{ApplyError, Broadcaster};
pub use hub::Hub;
pub use simulation::Simulation;

//! Service layer: the bus facade, the dispatcher and async drain workers.

pub mod bus;
mod dispatcher;
pub mod workers;

pub use bus::EventBus;
pub use workers::{DrainHandle, DrainReport, WorkerReport};

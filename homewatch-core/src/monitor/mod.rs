//! Threshold monitors over the decoded message stream.
//!
//! Both monitors attach to the pipeline's `Subject<SensorEvent>` and keep a
//! local mirror of their threshold, refreshed by subscribing to settings
//! changes. Evaluating an event therefore never touches storage; only the
//! deferred inactivity check re-reads the persisted last-motion slot.

mod battery;
mod inactivity;

pub use battery::BatteryMonitor;
pub use inactivity::InactivityMonitor;

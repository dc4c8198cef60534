//! Global bounded priority scheduler with aging-based starvation
//! prevention (spec §4.8). Optional: the runtime only routes module
//! tasks through this when the scheduler is enabled (§6 config).

mod error;
mod scheduler;

pub use error::SchedulerError;
pub use scheduler::{BoundedScheduler, SchedulerPermit, AGING_BOOST, AGING_INTERVAL};

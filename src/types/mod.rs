//! Core data model: ports, targets, and the collections the pipeline
//! passes between stages.

mod port;
mod target;

pub use port::{Port, PortError, PortSpec, Ports, Protocol};
pub use target::{NetworkLocation, StatusCell, Target, TargetStatus, Targets};

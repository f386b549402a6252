pub mod collective;
pub mod comm;
pub mod config;
pub mod error;
pub mod estimate;
pub mod report;
pub mod select;
pub mod snapshot;
pub mod tables;
pub mod threads;
pub mod topology;
pub mod tuning;

pub use collective::{Algorithm, CollFunc, Protocol};
pub use comm::{CompCapRange, Communicator};
pub use config::TuningConfig;
pub use estimate::AlgoTime;
pub use select::{LaunchShape, Selection};
pub use threads::DeviceLimits;
pub use topology::{CommTopology, LinkType, TopoGraph, TopoGraphs};
pub use tuning::CostModel;

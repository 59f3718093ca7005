//! Grid topology, per-city state, disaster overrides, and the tick
//! orchestrator.
//!
//! [`orchestrator::GridStore`] is the crate's main entry point: the
//! boundary layer calls [`GridStore::tick_and_read`] per poll and the
//! control operations for artificial outages and disasters.
//!
//! [`GridStore::tick_and_read`]: orchestrator::GridStore::tick_and_read
//! [`GridStore`]: orchestrator::GridStore

pub mod disaster;
pub mod orchestrator;
pub mod state;
pub mod summary;
pub mod topology;

pub use disaster::{ArtificialDisaster, ArtificialOutage, DisasterKind, DisasterParams};
pub use orchestrator::{ControlResult, DashboardData, GridError, GridStore, TransformerSnapshot};
pub use state::{CityState, HouseholdState, TransformerState};
pub use summary::{CitySummary, TransformerDigest};
pub use topology::{Topology, TopologyError, TopologyRow, TransformerKind};

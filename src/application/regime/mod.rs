//! Regime Calculator subsystem (spec §4.4): distribution-day tracking,
//! follow-through-day tracking, and the composite score/label/exposure
//! band calculation.

mod calculator;
mod distribution_day;
mod follow_through;

pub use calculator::RegimeCalculator;
pub use distribution_day::DistributionDayTracker;
pub use follow_through::{FollowThroughOutcome, FollowThroughTracker};

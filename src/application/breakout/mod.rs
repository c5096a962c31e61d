//! Breakout scoring + position sizing (spec §4.5's "evaluate breakout
//! score (scoring engine), apply size (position sizer)" duty of the
//! Breakout worker). Grounded in the teacher's `SizingEngine`
//! (`application::risk_management::sizing_engine`) for the sizing half;
//! the scoring half is new, built from the CANSLIM rating fields already
//! carried on `domain::position::Position` (spec §3/glossary: RS/EPS/A/D/
//! SMR ratings, base stage, pivot).

mod scoring;
mod sizing;

pub use scoring::{BreakoutScoreBreakdown, BreakoutScorer};
pub use sizing::{PositionSizer, SizingDecision};

//! Plan building and display for gatecfg
//!
//! The engine pairs manifest declarations with recorded state:
//! 1. Planning - Decide an action per address via the converge planner
//! 2. Diffing - Render attribute changes for review

pub mod differ;
pub mod planner;

pub use differ::display_plan;
pub use planner::build_plan;

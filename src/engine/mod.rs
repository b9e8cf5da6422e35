//! Execution engine for nuage
//!
//! The engine orchestrates:
//! 1. Planning - Load the stack and diff the blueprint against state
//! 2. Display - Show the plan grouped by resource type
//! 3. Executing - Apply changes wave by wave with progress and confirmation

pub mod differ;
pub mod executor;
pub mod planner;

pub use differ::display_plan;
pub use executor::{apply, print_summary, was_declined};
pub use planner::Stack;

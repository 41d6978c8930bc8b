//! Agent profiles and the roster that owns them
//!
//! Agents refer to each other by [`AgentId`]; the [`AgentRoster`] is the only
//! owner of profiles, so the triage ↔ specialist cycle needs no shared pointers.

pub mod profile;
pub mod roster;

pub use profile::{AgentId, AgentProfile};
pub use roster::{AgentRoster, MATH_TUTOR, STUDY_COACH, TRIAGE_AGENT, WRITING_TUTOR};

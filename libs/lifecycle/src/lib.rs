//! Typed, total state-transition tables for the two aggregates the core
//! tracks through their lifecycle. Both expose a `can_transition_to`
//! predicate and a `transition_to` mutator that fails closed on any pair
//! not in the table.

mod application;
mod job;

pub use application::{Application, ApplicationStatus};
pub use job::{Job, JobStatus, TransitionCause};

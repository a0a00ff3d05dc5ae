//! Motor de aprobaciones: construcción de cadenas, transiciones por decisión y
//! resultado tipado de cada operación.

pub mod construct;
pub mod core;
pub mod outcome;
pub mod transition;

pub use construct::Submission;
pub use core::{ApprovalEngine, PendingApproval};
pub use outcome::{BatchReport, DecisionReport, Outcome, SubmissionReport};
pub use transition::{Decision, DecisionCommand, Transition};

//! apqp-core: motor de aprobaciones secuenciales multinivel (APQP/PPAP).
//!
//! Sin I/O propio: la persistencia entra por `store::ApprovalStore` y las
//! notificaciones salen por `notify::NotificationSink`.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod model;
pub mod notify;
pub mod projection;
pub mod store;

pub use engine::{ApprovalEngine, BatchReport, Decision, DecisionCommand, DecisionReport, Outcome, PendingApproval,
                 Submission, SubmissionReport, Transition};
pub use errors::ApprovalError;
pub use model::{ApprovalRecord, ApprovalStatus, ApprovalTier, ItemDetail, ItemType, LifecycleStatus, StatusFlag,
                TrackedFile, User, WorkflowStep};
pub use notify::{Notification, NotificationSink, NotifyError, NullSink, RecordingSink, TemplateKind};
pub use projection::{ApprovalView, ChainSnapshot, ProjectControlView};
pub use store::{ApprovalStore, ChainTx, InMemoryApprovalStore};

//! Modelo de datos del engine (ItemDetail, ApprovalRecord, WorkflowStep, ...).

pub mod item;
pub mod record;
pub mod status;
pub mod workflow;

pub type ItemDetailId = i64;
pub type UserId = i64;
pub type DepartmentId = i64;

pub use item::{ItemDetail, TrackedFile};
pub use record::{ApprovalRecord, NewApprovalRecord};
pub use status::{ApprovalStatus, ApprovalTier, ItemType, LifecycleStatus, StatusFlag};
pub use workflow::{User, WorkflowStep};

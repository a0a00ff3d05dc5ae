//! Proyecciones de sólo lectura del estado de una cadena.
//!
//! Funciones puras: no escriben y toleran un ítem sin cadena. Los códigos
//! numéricos son los que consume la UI de listado y el tablero de control de
//! proyecto.

use serde::{Deserialize, Serialize};

use crate::model::{ApprovalRecord, ApprovalStatus, ApprovalTier, ItemDetail, LifecycleStatus};

/// Estado de aprobación mostrado en el listado de entregables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", content = "lifecycle", rename_all = "snake_case")]
pub enum ApprovalView {
    WaitingLeader,
    LeaderApproved,
    RejectedByLeader,
    RejectedByProjectControl,
    Approved,
    WaitingProjectControl,
    /// Archivo subido pero sin cadena.
    Uploaded,
    /// Archivo subido, sin cadena y ya cerrado.
    UploadedDone,
    /// Nunca enviado: sólo cuenta el ciclo de vida del ítem.
    NotSubmitted(LifecycleStatus),
    /// Combinación fuera de la tabla.
    Unresolved,
}

impl ApprovalView {
    /// Código numérico histórico. `NotSubmitted` comparte el 5 con `Approved`.
    pub fn code(&self) -> Option<u8> {
        match self {
            Self::WaitingLeader => Some(1),
            Self::LeaderApproved => Some(2),
            Self::RejectedByLeader => Some(3),
            Self::RejectedByProjectControl => Some(4),
            Self::Approved | Self::NotSubmitted(_) => Some(5),
            Self::WaitingProjectControl => Some(6),
            Self::Uploaded => Some(7),
            Self::UploadedDone => Some(8),
            Self::Unresolved => None,
        }
    }
}

/// Vista del tablero de control de proyecto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectControlView {
    NotSubmitted,
    WaitingLeader,
    WaitingProjectControl,
    ApprovedByProjectControl,
    RejectedByProjectControl,
    RejectedByLeader,
    Unresolved,
}

impl ProjectControlView {
    pub fn code(&self) -> Option<u8> {
        match self {
            Self::NotSubmitted => Some(0),
            Self::WaitingLeader => Some(1),
            Self::WaitingProjectControl => Some(2),
            Self::ApprovedByProjectControl => Some(3),
            Self::RejectedByProjectControl => Some(4),
            Self::RejectedByLeader => Some(5),
            Self::Unresolved => None,
        }
    }
}

/// Tabla de precedencia: sin cadena (con/sin archivo) > líder en espera >
/// líder aprobado > rechazos > aprobado > PJ en espera.
pub fn approval_view(action: Option<&ApprovalRecord>, lifecycle: LifecycleStatus, has_file: bool) -> ApprovalView {
    use ApprovalStatus as S;
    use ApprovalTier as T;
    use LifecycleStatus as L;

    let Some(rec) = action else {
        return match (has_file, lifecycle) {
            (true, L::Done) => ApprovalView::UploadedDone,
            (true, _) => ApprovalView::Uploaded,
            (false, l) => ApprovalView::NotSubmitted(l),
        };
    };
    match (rec.status, rec.tier, lifecycle) {
        (S::Waiting, T::Leader, L::Waiting) => ApprovalView::WaitingLeader,
        (S::Approve, T::Leader, L::Waiting) => ApprovalView::LeaderApproved,
        (S::Reject, T::Leader, _) => ApprovalView::RejectedByLeader,
        (S::Reject, T::Pj, _) => ApprovalView::RejectedByProjectControl,
        (S::Approve, _, L::Done) => ApprovalView::Approved,
        (S::Waiting, T::Pj, _) => ApprovalView::WaitingProjectControl,
        _ => ApprovalView::Unresolved,
    }
}

pub fn project_control_view(action: Option<&ApprovalRecord>) -> ProjectControlView {
    let Some(rec) = action else {
        return ProjectControlView::NotSubmitted;
    };
    match (rec.status, rec.tier) {
        (ApprovalStatus::Waiting, ApprovalTier::Leader) => ProjectControlView::WaitingLeader,
        (ApprovalStatus::Waiting, ApprovalTier::Pj) => ProjectControlView::WaitingProjectControl,
        (ApprovalStatus::Approve, ApprovalTier::Pj) => ProjectControlView::ApprovedByProjectControl,
        (ApprovalStatus::Reject, ApprovalTier::Pj) => ProjectControlView::RejectedByProjectControl,
        (ApprovalStatus::Reject, ApprovalTier::Leader) => ProjectControlView::RejectedByLeader,
        _ => ProjectControlView::Unresolved,
    }
}

/// Foto completa de la cadena de un ítem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub item: ItemDetail,
    pub has_file: bool,
    /// Registros vigentes por `level`.
    pub chain: Vec<ApprovalRecord>,
    /// Registros archivados de envíos anteriores.
    pub history: Vec<ApprovalRecord>,
    pub current: Option<ApprovalRecord>,
    pub view: ApprovalView,
    pub project_view: ProjectControlView,
}

impl ChainSnapshot {
    /// `records` en cualquier orden; se reordenan por (`level`, `id`).
    pub fn build(item: ItemDetail, has_file: bool, mut records: Vec<ApprovalRecord>) -> Self {
        records.sort_by_key(|r| (r.level, r.id));
        let (chain, history): (Vec<_>, Vec<_>) = records.into_iter().partition(|r| r.is_live());
        let current = chain.iter().find(|r| r.is_current_action()).cloned();
        let view = approval_view(current.as_ref(), item.lifecycle_status, has_file);
        let project_view = project_control_view(current.as_ref());
        Self { item,
               has_file,
               chain,
               history,
               current,
               view,
               project_view }
    }

    /// Líderes vigentes que aún no decidieron.
    pub fn pending_leaders(&self) -> usize {
        self.chain.iter().filter(|r| r.is_pending_leader()).count()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::StatusFlag;

    fn rec(status: ApprovalStatus, tier: ApprovalTier) -> ApprovalRecord {
        let now = Utc::now();
        ApprovalRecord { id: 1,
                         item_detail_id: 1,
                         approver_id: 2,
                         level: 1,
                         status,
                         is_action: true,
                         round: 0,
                         tier,
                         status_flag: StatusFlag::Active,
                         note: None,
                         created_at: now,
                         created_by: 3,
                         updated_at: now,
                         updated_by: 3 }
    }

    #[test]
    fn missing_chain_falls_back_to_file_and_lifecycle() {
        assert_eq!(approval_view(None, LifecycleStatus::Done, true), ApprovalView::UploadedDone);
        assert_eq!(approval_view(None, LifecycleStatus::Waiting, true), ApprovalView::Uploaded);
        assert_eq!(approval_view(None, LifecycleStatus::Delay, false),
                   ApprovalView::NotSubmitted(LifecycleStatus::Delay));
        assert_eq!(approval_view(None, LifecycleStatus::InProgress, false).code(), Some(5));
    }

    #[test]
    fn precedence_table_codes() {
        use ApprovalStatus::*;
        use ApprovalTier::*;
        let cases = [(rec(Waiting, Leader), LifecycleStatus::Waiting, Some(1)),
                     (rec(Approve, Leader), LifecycleStatus::Waiting, Some(2)),
                     (rec(Reject, Leader), LifecycleStatus::Reject, Some(3)),
                     (rec(Reject, Pj), LifecycleStatus::Reject, Some(4)),
                     (rec(Approve, Pj), LifecycleStatus::Done, Some(5)),
                     (rec(Waiting, Pj), LifecycleStatus::Waiting, Some(6)),
                     (rec(Waiting, Leader), LifecycleStatus::InProgress, None)];
        for (r, lifecycle, code) in cases {
            assert_eq!(approval_view(Some(&r), lifecycle, true).code(), code, "{:?}/{:?}", r.status, r.tier);
        }
    }

    #[test]
    fn project_control_codes() {
        assert_eq!(project_control_view(None).code(), Some(0));
        assert_eq!(project_control_view(Some(&rec(ApprovalStatus::Waiting, ApprovalTier::Pj))).code(), Some(2));
        assert_eq!(project_control_view(Some(&rec(ApprovalStatus::Reject, ApprovalTier::Leader))).code(), Some(5));
        assert_eq!(project_control_view(Some(&rec(ApprovalStatus::Approve, ApprovalTier::Leader))),
                   ProjectControlView::Unresolved);
    }
}

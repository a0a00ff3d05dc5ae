//! Enumeraciones de estado persistidas como texto.
//!
//! Cada enum expone `as_str` (forma almacenada) y `FromStr` (lectura desde la
//! base o desde la entrada del usuario). Las formas de texto son estables: los
//! CHECK de las migraciones y la UI dependen de ellas.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ApprovalError;

/// Estado de ciclo de vida de un `ItemDetail`.
///
/// El engine sólo transiciona entre `Waiting`, `Done` y `Reject`; el resto lo
/// fijan colaboradores externos (alta de proyecto, planificación).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    InProgress,
    Waiting,
    Done,
    Reject,
    Delay,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "inprogress",
            Self::Waiting => "waiting",
            Self::Done => "done",
            Self::Reject => "reject",
            Self::Delay => "delay",
        }
    }
}

impl FromStr for LifecycleStatus {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inprogress" => Ok(Self::InProgress),
            "waiting" => Ok(Self::Waiting),
            "done" => Ok(Self::Done),
            "reject" => Ok(Self::Reject),
            "delay" => Ok(Self::Delay),
            other => Err(ApprovalError::Validation(format!("unknown lifecycle status '{other}'"))),
        }
    }
}

/// Estado de un `ApprovalRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Waiting,
    Approve,
    Reject,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Waiting)
    }
}

impl FromStr for ApprovalStatus {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Filas históricas guardan "Approve" con mayúscula.
        match s.to_ascii_lowercase().as_str() {
            "waiting" => Ok(Self::Waiting),
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            _ => Err(ApprovalError::Validation(format!("unknown approval status '{s}'"))),
        }
    }
}

/// Nivel de aprobación: líderes del departamento y luego control de proyecto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalTier {
    Leader,
    #[serde(rename = "PJ")]
    Pj,
}

impl ApprovalTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leader => "Leader",
            Self::Pj => "PJ",
        }
    }
}

impl FromStr for ApprovalTier {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Leader" => Ok(Self::Leader),
            "PJ" => Ok(Self::Pj),
            other => Err(ApprovalError::Validation(format!("unknown approval tier '{other}'"))),
        }
    }
}

/// Marca de vigencia. Un registro `Inactive` es histórico e inmutable; también
/// se usa para el estado de los `WorkflowStep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFlag {
    Active,
    Inactive,
}

impl StatusFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl FromStr for StatusFlag {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(ApprovalError::Validation(format!("unknown status flag '{other}'"))),
        }
    }
}

/// Tipo de entregable al que pertenece un `ItemDetail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Apqp,
    Ppap,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apqp => "apqp",
            Self::Ppap => "ppap",
        }
    }
}

impl FromStr for ItemType {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apqp" => Ok(Self::Apqp),
            "ppap" => Ok(Self::Ppap),
            other => Err(ApprovalError::Validation(format!("unknown item type '{other}'"))),
        }
    }
}

macro_rules! display_as_str {
    ($($t:ty),*) => {
        $(impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(LifecycleStatus, ApprovalStatus, ApprovalTier, StatusFlag, ItemType);

//! Modelo de TimeLog (sesión de fichaje)
//!
//! Una sesión de trabajo de un técnico sobre un ticket. El invariante duro
//! del sistema vive aquí: un técnico tiene como máximo UNA sesión de
//! trabajo abierta (`ended_at = None`) en todo el sistema; el clock-out
//! siempre cierra "la" sesión abierta del técnico, no una por ticket.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ticket::TicketStatus;

/// Tipo de sesión: trabajo productivo o registro instantáneo de cambio de estado
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Work,
    StatusChange,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Work => "work",
            SessionKind::StatusChange => "status_change",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "work" => Some(SessionKind::Work),
            "status_change" => Some(SessionKind::StatusChange),
            _ => None,
        }
    }
}

/// TimeLog - sesión de fichaje de un técnico
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeLog {
    pub id: Uuid,
    pub ticket_id: String,
    pub technician_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// `None` = sesión abierta/activa
    pub ended_at: Option<DateTime<Utc>>,
    pub kind: SessionKind,
    /// Snapshot del estado del ticket al abrir la sesión (para analítica)
    pub ticket_status_snapshot: TicketStatus,
    pub selected_tasks: Option<Vec<String>>,
    /// Payload de resoluciones tal cual lo reportó el técnico (auditoría)
    pub resolutions: Option<serde_json::Value>,
    pub notes: Option<String>,
}

impl TimeLog {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Duración de la sesión: `end - start` si está cerrada, `now - start`
    /// si sigue abierta. Se recalcula en cada lectura, nunca se almacena.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.ended_at.unwrap_or(now) - self.started_at
    }
}

/// Resolución reportada por el técnico sobre un item del checklist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResolution {
    pub fixed: bool,
    #[serde(default)]
    pub notes: String,
}

/// Issue nuevo descubierto por el técnico durante la reparación
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIssue {
    /// Nombre del componente afectado
    pub item: String,
    pub description: String,
    /// `true` si se arregló al descubrirlo
    #[serde(default)]
    pub fixed: bool,
}

/// Request de clock-out
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClockOutRequest {
    /// Resoluciones por item id con prefijo (`mech-<item>` / `cos-<item>`)
    #[serde(default)]
    pub resolutions: HashMap<String, ItemResolution>,
    #[serde(default)]
    pub new_issues: Vec<NewIssue>,
    pub notes: Option<String>,
}

/// Resultado del clock-out devuelto a la capa de UI
#[derive(Debug, Clone, Serialize)]
pub struct ClockOutOutcome {
    pub ticket_status: TicketStatus,
    pub items_fixed: usize,
    pub remaining_open: usize,
}

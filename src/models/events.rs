//! Payloads de eventos de workflow
//!
//! Los eventos viajan por el `WorkflowEventBus` como `serde_json::Value`;
//! estos structs son el schema tipado de cada payload. Nunca cruzan un
//! límite de proceso, así que no hay versionado.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::auth::Actor;
use crate::models::inspection::PriorityTier;
use crate::models::ticket::TicketType;

/// Una inspección terminó y puede necesitar un ticket de recon
pub const INSPECTION_COMPLETED: &str = "INSPECTION_COMPLETED";

/// Un ticket llegó a `Completed`; dispara el siguiente eslabón del pipeline
pub const TICKET_COMPLETED: &str = "TICKET_COMPLETED";

/// Payload de `INSPECTION_COMPLETED`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionCompletedEvent {
    pub inspection_id: Uuid,
    pub vehicle_id: Uuid,
    /// Resumen de hallazgos tal como lo envió la UI; el subscriber
    /// re-deriva el resumen real desde el ledger persistido
    pub findings: Option<serde_json::Value>,
    pub detailed_findings: Option<serde_json::Value>,
    pub priority: PriorityTier,
    pub notes: Option<String>,
    pub actor: Actor,
}

/// Payload de `TICKET_COMPLETED`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketCompletedEvent {
    pub ticket_id: String,
    pub vehicle_id: Uuid,
    pub ticket_type: TicketType,
    pub actor: Actor,
}

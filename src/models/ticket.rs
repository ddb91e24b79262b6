//! Modelo de ServiceTicket
//!
//! Este módulo contiene el ticket de servicio, su enum de estados y las
//! reglas puras de transición. Los efectos colaterales (vehículo, logs,
//! parts) viven en `services::ticket_service`; aquí solo hay datos y
//! decisiones de estado sin I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::vehicle::VehicleStatus;

/// Estado del ticket de servicio
///
/// Flujo principal: Queue → Assigned → InProgress ⇄ WaitingParts →
/// QualityControl → Completed. `PartiallyComplete` es una rama lateral de
/// `InProgress` cuando un clock-out arregla parte de los issues abiertos.
/// `Completed` es terminal: la vida de reparación del vehículo continúa en
/// un ticket nuevo creado por el workflow, nunca reabriendo este.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    Queue,
    Assigned,
    WaitingParts,
    InProgress,
    PartiallyComplete,
    QualityControl,
    Completed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Queue => "Queue",
            TicketStatus::Assigned => "Assigned",
            TicketStatus::WaitingParts => "WaitingParts",
            TicketStatus::InProgress => "InProgress",
            TicketStatus::PartiallyComplete => "PartiallyComplete",
            TicketStatus::QualityControl => "QualityControl",
            TicketStatus::Completed => "Completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Queue" => Some(TicketStatus::Queue),
            "Assigned" => Some(TicketStatus::Assigned),
            "WaitingParts" => Some(TicketStatus::WaitingParts),
            "InProgress" => Some(TicketStatus::InProgress),
            "PartiallyComplete" => Some(TicketStatus::PartiallyComplete),
            "QualityControl" => Some(TicketStatus::QualityControl),
            "Completed" => Some(TicketStatus::Completed),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TicketStatus::Completed)
    }

    /// Estado resultante de un clock-in: avanza a `InProgress` salvo que el
    /// ticket ya haya pasado de esa etapa
    pub fn after_clock_in(self) -> TicketStatus {
        match self {
            TicketStatus::Queue | TicketStatus::Assigned | TicketStatus::WaitingParts => {
                TicketStatus::InProgress
            }
            other => other,
        }
    }

    /// Estado resultante de un clock-out según el resultado del merge del
    /// ledger: con arreglos y nada abierto → QC, con arreglos y issues
    /// pendientes → PartiallyComplete, sin arreglos → sin cambio
    pub fn after_clock_out(self, items_fixed: usize, remaining_open: usize) -> TicketStatus {
        match self {
            TicketStatus::InProgress | TicketStatus::PartiallyComplete if items_fixed > 0 => {
                if remaining_open == 0 {
                    TicketStatus::QualityControl
                } else {
                    TicketStatus::PartiallyComplete
                }
            }
            other => other,
        }
    }
}

/// Tipo de ticket - la "lane" de workflow a la que pertenece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketType {
    Recon,
    Detailing,
    ClientRequest,
    Other,
}

impl TicketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketType::Recon => "recon",
            TicketType::Detailing => "detailing",
            TicketType::ClientRequest => "client_request",
            TicketType::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "recon" => Some(TicketType::Recon),
            "detailing" => Some(TicketType::Detailing),
            "client_request" => Some(TicketType::ClientRequest),
            "other" => Some(TicketType::Other),
            _ => None,
        }
    }

    /// Estado terminal del vehículo cuando se completa un ticket de este tipo
    pub fn terminal_vehicle_status(&self) -> VehicleStatus {
        match self {
            TicketType::Recon | TicketType::Other => VehicleStatus::Repaired,
            TicketType::Detailing => VehicleStatus::Detailed,
            TicketType::ClientRequest => VehicleStatus::ReadyForPickup,
        }
    }
}

/// Dificultad estimada de la reparación
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairTier {
    Light,
    Moderate,
    Heavy,
}

impl RepairTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairTier::Light => "light",
            RepairTier::Moderate => "moderate",
            RepairTier::Heavy => "heavy",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(RepairTier::Light),
            "moderate" => Some(RepairTier::Moderate),
            "heavy" => Some(RepairTier::Heavy),
            _ => None,
        }
    }
}

/// ServiceTicket - ticket de servicio del taller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTicket {
    /// Id opaco pero legible: sufijo del VIN + timestamp de creación
    pub id: String,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    pub vehicle_id: Uuid,
    pub description: String,
    pub status: TicketStatus,
    pub assigned_to: Option<Uuid>,
    pub process_notes: Option<String>,
    pub difficulty: Option<RepairTier>,
    pub inspection_id: Option<Uuid>,
    pub ticket_type: TicketType,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ServiceTicket {
    /// Un ticket activo participa en queries y transiciones
    pub fn is_active(&self) -> bool {
        !self.deleted && !self.status.is_completed()
    }
}

/// Longitud del sufijo de VIN usado en los ids de ticket
const VIN_SUFFIX_LEN: usize = 6;

/// Genera el id humano-legible de un ticket: `<VIN-suffix>-<yymmddHHMMSSmmm>`
///
/// Nunca se reutiliza: el timestamp va a resolución de milisegundo (un
/// ticket follow-on del mismo vehículo puede crearse dentro del mismo
/// segundo) y la creación pasa por el store, que rechaza claves duplicadas.
pub fn generate_ticket_id(vin: &str, created_at: DateTime<Utc>) -> String {
    let suffix: String = vin
        .chars()
        .rev()
        .take(VIN_SUFFIX_LEN)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!(
        "{}-{}",
        suffix.to_uppercase(),
        created_at.format("%y%m%d%H%M%S%3f")
    )
}

/// Request para crear un nuevo ticket de servicio
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTicketRequest {
    pub vehicle_id: Uuid,

    #[validate(length(min = 1, max = 2000))]
    pub description: String,

    pub inspection_id: Option<Uuid>,

    pub ticket_type: TicketType,

    pub priority: Option<crate::models::inspection::PriorityTier>,

    pub difficulty: Option<RepairTier>,
}

/// Resultado de la operación `complete`
#[derive(Debug, Clone, Serialize)]
pub struct CompleteOutcome {
    pub new_status: TicketStatus,
}

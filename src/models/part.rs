//! Modelo de Part (solicitud de repuesto)
//!
//! Registro de repuesto pedido para un ticket. Se crea en `requestParts`,
//! pasa en bloque a `Received` en la confirmación y no se muta más.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Estado del repuesto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartStatus {
    Ordered,
    Received,
}

impl PartStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartStatus::Ordered => "ordered",
            PartStatus::Received => "received",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ordered" => Some(PartStatus::Ordered),
            "received" => Some(PartStatus::Received),
            _ => None,
        }
    }
}

/// Part - repuesto pedido para un ticket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub id: Uuid,
    pub ticket_id: String,
    pub description: String,
    pub status: PartStatus,
    pub cost: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Request para pedir un repuesto
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RequestPartsRequest {
    #[validate(length(min = 1, max = 500))]
    pub description: String,

    pub cost: Option<Decimal>,
}

//! Modelo de Vehicle
//!
//! El vehículo es un colaborador del workflow: los tickets le cambian el
//! estado como efecto colateral de sus transiciones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Estado del vehículo dentro del ciclo de reparación
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Purchased,
    Inspected,
    InRepair,
    Repaired,
    Detailed,
    ReadyForPickup,
    Sold,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Purchased => "purchased",
            VehicleStatus::Inspected => "inspected",
            VehicleStatus::InRepair => "in_repair",
            VehicleStatus::Repaired => "repaired",
            VehicleStatus::Detailed => "detailed",
            VehicleStatus::ReadyForPickup => "ready_for_pickup",
            VehicleStatus::Sold => "sold",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "purchased" => Some(VehicleStatus::Purchased),
            "inspected" => Some(VehicleStatus::Inspected),
            "in_repair" => Some(VehicleStatus::InRepair),
            "repaired" => Some(VehicleStatus::Repaired),
            "detailed" => Some(VehicleStatus::Detailed),
            "ready_for_pickup" => Some(VehicleStatus::ReadyForPickup),
            "sold" => Some(VehicleStatus::Sold),
            _ => None,
        }
    }
}

/// Vehicle - referencia mínima que necesita el motor de workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    pub vin: String,
    pub status: VehicleStatus,
    pub sold: bool,
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    /// Un vehículo vendido no entra en el workflow automático de recon
    pub fn is_sold(&self) -> bool {
        self.sold || self.status == VehicleStatus::Sold
    }
}

//! Modelo de Inspection (recon ledger)
//!
//! El registro estructurado de recon por inspección: dos checklists
//! independientes (mecánico y cosmético) de item → estado + notas, más los
//! códigos de diagnóstico. El origen histórico guardaba esto como blobs
//! JSON sueltos; aquí el estado es un enum tipado con deserialización
//! defensiva: un valor desconocido pasa a `Unknown` (no-failing) y un blob
//! malformado se trata como ledger vacío, nunca como error fatal.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Estado de un item del checklist
///
/// Los valores persistidos son los strings exactos case-sensitive
/// `Pass|Attention|Fail|Fixed`; cualquier otro valor legacy deserializa a
/// `Unknown` y cuenta como no-failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Pass,
    Attention,
    Fail,
    Fixed,
    Unknown,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pass => "Pass",
            ItemStatus::Attention => "Attention",
            ItemStatus::Fail => "Fail",
            ItemStatus::Fixed => "Fixed",
            ItemStatus::Unknown => "Unknown",
        }
    }

    /// Match exacto y case-sensitive; todo lo demás es `Unknown`
    pub fn parse(value: &str) -> Self {
        match value {
            "Pass" => ItemStatus::Pass,
            "Attention" => ItemStatus::Attention,
            "Fail" => ItemStatus::Fail,
            "Fixed" => ItemStatus::Fixed,
            _ => ItemStatus::Unknown,
        }
    }

    /// Un item abierto es el que sigue pendiente de reparación
    pub fn is_open(&self) -> bool {
        matches!(self, ItemStatus::Fail | ItemStatus::Attention)
    }
}

impl Serialize for ItemStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ItemStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(ItemStatus::parse(&value))
    }
}

/// Entrada del checklist: estado + notas acumuladas de los técnicos
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistEntry {
    pub status: ItemStatus,
    #[serde(default)]
    pub notes: String,
}

impl ChecklistEntry {
    pub fn new(status: ItemStatus, notes: impl Into<String>) -> Self {
        Self {
            status,
            notes: notes.into(),
        }
    }
}

/// Mapa ordenado de item → entrada (claves únicas por mapa)
pub type ChecklistMap = BTreeMap<String, ChecklistEntry>;

/// Código de diagnóstico (DTC) reportado en la inspección
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticCode {
    pub code: String,
    pub description: String,
}

/// Prioridad de la inspección / ticket derivado
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Low,
    Normal,
    High,
    Urgent,
}

impl PriorityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::Low => "low",
            PriorityTier::Normal => "normal",
            PriorityTier::High => "high",
            PriorityTier::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(PriorityTier::Low),
            "normal" => Some(PriorityTier::Normal),
            "high" => Some(PriorityTier::High),
            "urgent" => Some(PriorityTier::Urgent),
            _ => None,
        }
    }
}

/// Inspection - el recon ledger de un vehículo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inspection {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    pub vehicle_id: Uuid,
    pub mechanical: ChecklistMap,
    pub cosmetic: ChecklistMap,
    pub diagnostic_codes: Vec<DiagnosticCode>,
    pub needs_mechanical_recon: bool,
    pub needs_cosmetic_recon: bool,
    pub priority: PriorityTier,
    pub created_at: DateTime<Utc>,
}

impl Inspection {
    /// Issues abiertos restantes: conteo fresco de entradas `Fail` o
    /// `Attention` en ambos mapas. Nunca se mantiene incrementalmente.
    pub fn remaining_open(&self) -> usize {
        self.mechanical
            .values()
            .chain(self.cosmetic.values())
            .filter(|entry| entry.status.is_open())
            .count()
    }
}

/// Parse defensivo de un blob de checklist persistido
///
/// Un blob malformado (no-objeto, entradas rotas) produce un mapa vacío en
/// lugar de un error: el dato legacy no puede tumbar un clock-out.
pub fn checklist_from_value(value: serde_json::Value) -> ChecklistMap {
    serde_json::from_value(value).unwrap_or_default()
}

/// Parse defensivo de la lista de códigos de diagnóstico
pub fn diagnostic_codes_from_value(value: serde_json::Value) -> Vec<DiagnosticCode> {
    serde_json::from_value(value).unwrap_or_default()
}

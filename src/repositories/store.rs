//! Contrato del storage collaborator
//!
//! Las mutaciones del workflow tocan varias entidades a la vez (ticket +
//! vehículo + time log + ledger). El trait expone una operación compuesta
//! por mutación para que cada backend la haga atómica: o todo commitea o
//! nada. La corrección bajo concurrencia descansa aquí, no en locks del
//! proceso (ver `memory_store` y `pg_store`).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::inspection::Inspection;
use crate::models::part::Part;
use crate::models::ticket::{ServiceTicket, TicketStatus, TicketType};
use crate::models::time_log::{ItemResolution, NewIssue, TimeLog};
use crate::models::vehicle::{Vehicle, VehicleStatus};
use crate::services::inspection_ledger::MergeOutcome;
use crate::utils::errors::AppResult;

/// Argumentos del cierre de sesión
///
/// El backend localiza la sesión abierta del técnico, aplica el merge del
/// ledger y recalcula el estado del ticket dentro de su sección atómica.
#[derive(Debug, Clone)]
pub struct ClockOutArgs {
    pub technician_id: Uuid,
    pub ended_at: DateTime<Utc>,
    pub resolutions: HashMap<String, ItemResolution>,
    pub new_issues: Vec<NewIssue>,
    pub notes: Option<String>,
}

/// Resultado del cierre de sesión aplicado por el backend
#[derive(Debug, Clone)]
pub struct ClockOutRecord {
    pub session: TimeLog,
    pub ticket: ServiceTicket,
    pub outcome: MergeOutcome,
}

/// Colaborador transaccional de storage del motor de workflow
///
/// Reglas comunes a todas las implementaciones:
/// - `get_ticket` y `find_active_ticket` excluyen tickets soft-deleted;
///   el filtro vive en el boundary de storage, no repartido por operación.
/// - Las operaciones compuestas devuelven los errores tipados del dominio
///   (`SessionConflict`, `NoActiveSession`, `TicketNotFound`) cuando la
///   re-comprobación dentro de la sección atómica falla.
#[async_trait]
pub trait WorkshopStore: Send + Sync {
    // --- lecturas ---

    async fn get_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>>;

    /// Ticket por id, excluyendo soft-deleted
    async fn get_ticket(&self, id: &str) -> AppResult<Option<ServiceTicket>>;

    /// `true` si el id ya está ocupado, tickets borrados incluidos (los
    /// ids derivados de VIN + timestamp nunca se reciclan)
    async fn ticket_exists(&self, id: &str) -> AppResult<bool>;

    async fn get_inspection(&self, id: Uuid) -> AppResult<Option<Inspection>>;

    /// Ticket activo (no completado, no borrado) de un vehículo en una lane
    async fn find_active_ticket(
        &self,
        vehicle_id: Uuid,
        ticket_type: TicketType,
    ) -> AppResult<Option<ServiceTicket>>;

    /// La sesión de trabajo abierta de un técnico, búsqueda global
    async fn find_open_session(&self, technician_id: Uuid) -> AppResult<Option<TimeLog>>;

    async fn sessions_for_ticket(&self, ticket_id: &str) -> AppResult<Vec<TimeLog>>;

    async fn parts_for_ticket(&self, ticket_id: &str) -> AppResult<Vec<Part>>;

    // --- seeds (colaboradores externos crean estas entidades) ---

    async fn insert_vehicle(&self, vehicle: Vehicle) -> AppResult<()>;

    async fn insert_inspection(&self, inspection: Inspection) -> AppResult<()>;

    // --- mutaciones compuestas (atómicas) ---

    /// Inserta el ticket y, si se pide, actualiza el estado del vehículo
    /// (`None` lo preserva: lo usan las creaciones follow-on del workflow)
    ///
    /// Re-comprueba dentro de la sección atómica que la lane del vehículo
    /// esté libre (error de validación si no) y que el id no exista
    /// (`DuplicateTicketId`; el caller regenera y reintenta).
    async fn create_ticket(
        &self,
        ticket: ServiceTicket,
        vehicle_status: Option<VehicleStatus>,
    ) -> AppResult<ServiceTicket>;

    /// Abre la sesión, avanza el ticket y el vehículo
    ///
    /// Re-comprueba el invariante "una sesión abierta por técnico" dentro
    /// de la sección atómica: de dos clock-ins concurrentes exactamente
    /// uno gana y el otro recibe `SessionConflict`.
    async fn clock_in(
        &self,
        log: TimeLog,
        ticket_status: TicketStatus,
        vehicle_status: VehicleStatus,
    ) -> AppResult<TimeLog>;

    /// Cierra la sesión abierta del técnico, merge del ledger incluido
    ///
    /// Sesión + ledger + estado del ticket commitean como una unidad; un
    /// commit parcial es un bug de corrección, no un estado degradado.
    async fn clock_out(&self, args: ClockOutArgs) -> AppResult<ClockOutRecord>;

    /// Crea el part pedido, mueve el ticket y registra el log instantáneo
    async fn request_parts(
        &self,
        part: Part,
        ticket_status: TicketStatus,
        log: TimeLog,
    ) -> AppResult<Part>;

    /// Pasa en bloque los parts `Ordered` a `Received` y devuelve cuántos
    async fn confirm_parts(
        &self,
        ticket_id: &str,
        ticket_status: TicketStatus,
        vehicle_status: VehicleStatus,
        log: TimeLog,
    ) -> AppResult<u64>;

    /// Cambio de estado directo (complete / force-complete / QC)
    async fn set_ticket_status(
        &self,
        ticket_id: &str,
        status: TicketStatus,
        vehicle_status: Option<VehicleStatus>,
        completed_at: Option<DateTime<Utc>>,
    ) -> AppResult<ServiceTicket>;

    /// Soft-delete: el ticket desaparece de las queries activas; no hay
    /// cascade sobre time logs ni parts
    async fn soft_delete_ticket(
        &self,
        ticket_id: &str,
        deleted_by: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()>;
}

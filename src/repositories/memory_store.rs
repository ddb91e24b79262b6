//! MemoryStore - implementación in-memory del storage collaborator
//!
//! Implementación de referencia del contrato de atomicidad: todo el data
//! set vive detrás de un único `tokio::sync::Mutex`, así que cada
//! operación compuesta se ejecuta serializada y o aplica todos sus
//! cambios o devuelve error sin tocar nada. Es el backend de los tests de
//! integración; no pretende rendir en producción.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::inspection::Inspection;
use crate::models::part::{Part, PartStatus};
use crate::models::ticket::{ServiceTicket, TicketStatus, TicketType};
use crate::models::time_log::{SessionKind, TimeLog};
use crate::models::vehicle::{Vehicle, VehicleStatus};
use crate::repositories::store::{ClockOutArgs, ClockOutRecord, WorkshopStore};
use crate::services::inspection_ledger::{self, MergeOutcome};
use crate::utils::errors::{
    internal_error, not_found_error, ticket_not_found, validation_error, AppError, AppResult,
};

#[derive(Default)]
struct StoreData {
    vehicles: HashMap<Uuid, Vehicle>,
    tickets: HashMap<String, ServiceTicket>,
    sessions: HashMap<Uuid, TimeLog>,
    parts: HashMap<Uuid, Part>,
    inspections: HashMap<Uuid, Inspection>,
}

impl StoreData {
    fn active_ticket(&self, id: &str) -> Option<&ServiceTicket> {
        self.tickets.get(id).filter(|t| !t.deleted)
    }

    fn open_session_of(&self, technician_id: Uuid) -> Option<&TimeLog> {
        self.sessions.values().find(|s| {
            s.technician_id == technician_id && s.ended_at.is_none() && s.kind == SessionKind::Work
        })
    }
}

/// Store in-memory para tests y entornos efímeros
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkshopStore for MemoryStore {
    async fn get_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        let data = self.data.lock().await;
        Ok(data.vehicles.get(&id).cloned())
    }

    async fn get_ticket(&self, id: &str) -> AppResult<Option<ServiceTicket>> {
        let data = self.data.lock().await;
        Ok(data.active_ticket(id).cloned())
    }

    async fn ticket_exists(&self, id: &str) -> AppResult<bool> {
        let data = self.data.lock().await;
        Ok(data.tickets.contains_key(id))
    }

    async fn get_inspection(&self, id: Uuid) -> AppResult<Option<Inspection>> {
        let data = self.data.lock().await;
        Ok(data.inspections.get(&id).cloned())
    }

    async fn find_active_ticket(
        &self,
        vehicle_id: Uuid,
        ticket_type: TicketType,
    ) -> AppResult<Option<ServiceTicket>> {
        let data = self.data.lock().await;
        Ok(data
            .tickets
            .values()
            .find(|t| t.vehicle_id == vehicle_id && t.ticket_type == ticket_type && t.is_active())
            .cloned())
    }

    async fn find_open_session(&self, technician_id: Uuid) -> AppResult<Option<TimeLog>> {
        let data = self.data.lock().await;
        Ok(data.open_session_of(technician_id).cloned())
    }

    async fn sessions_for_ticket(&self, ticket_id: &str) -> AppResult<Vec<TimeLog>> {
        let data = self.data.lock().await;
        let mut sessions: Vec<TimeLog> = data
            .sessions
            .values()
            .filter(|s| s.ticket_id == ticket_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        Ok(sessions)
    }

    async fn parts_for_ticket(&self, ticket_id: &str) -> AppResult<Vec<Part>> {
        let data = self.data.lock().await;
        let mut parts: Vec<Part> = data
            .parts
            .values()
            .filter(|p| p.ticket_id == ticket_id)
            .cloned()
            .collect();
        parts.sort_by_key(|p| p.created_at);
        Ok(parts)
    }

    async fn insert_vehicle(&self, vehicle: Vehicle) -> AppResult<()> {
        let mut data = self.data.lock().await;
        data.vehicles.insert(vehicle.id, vehicle);
        Ok(())
    }

    async fn insert_inspection(&self, inspection: Inspection) -> AppResult<()> {
        let mut data = self.data.lock().await;
        data.inspections.insert(inspection.id, inspection);
        Ok(())
    }

    async fn create_ticket(
        &self,
        ticket: ServiceTicket,
        vehicle_status: Option<VehicleStatus>,
    ) -> AppResult<ServiceTicket> {
        let mut data = self.data.lock().await;

        // re-comprobación del invariante de lane dentro de la sección
        // atómica: dos creates concurrentes en la misma lane no pueden
        // pasar los dos el chequeo del service
        let lane_taken = data.tickets.values().any(|t| {
            t.vehicle_id == ticket.vehicle_id
                && t.ticket_type == ticket.ticket_type
                && t.is_active()
        });
        if lane_taken {
            return Err(validation_error(
                "ticket_type",
                "an active ticket already exists for this vehicle in this lane",
            ));
        }

        if data.tickets.contains_key(&ticket.id) {
            return Err(AppError::DuplicateTicketId(ticket.id));
        }
        let vehicle = data
            .vehicles
            .get_mut(&ticket.vehicle_id)
            .ok_or_else(|| not_found_error("vehicle", &ticket.vehicle_id.to_string()))?;

        if let Some(new_status) = vehicle_status {
            vehicle.status = new_status;
        }
        data.tickets.insert(ticket.id.clone(), ticket.clone());
        Ok(ticket)
    }

    async fn clock_in(
        &self,
        log: TimeLog,
        ticket_status: TicketStatus,
        vehicle_status: VehicleStatus,
    ) -> AppResult<TimeLog> {
        let mut data = self.data.lock().await;

        // re-comprobación del invariante dentro de la sección atómica
        if let Some(open) = data.open_session_of(log.technician_id) {
            return Err(AppError::SessionConflict(format!(
                "technician '{}' already has an open session on ticket '{}'",
                log.technician_id, open.ticket_id
            )));
        }

        let ticket = data
            .tickets
            .get(&log.ticket_id)
            .filter(|t| !t.deleted && !t.status.is_completed())
            .ok_or_else(|| ticket_not_found(&log.ticket_id))?;
        let vehicle_id = ticket.vehicle_id;

        if let Some(ticket) = data.tickets.get_mut(&log.ticket_id) {
            ticket.status = ticket_status;
        }
        if let Some(vehicle) = data.vehicles.get_mut(&vehicle_id) {
            vehicle.status = vehicle_status;
        }
        data.sessions.insert(log.id, log.clone());
        Ok(log)
    }

    async fn clock_out(&self, args: ClockOutArgs) -> AppResult<ClockOutRecord> {
        let mut data = self.data.lock().await;

        let session_id = data
            .open_session_of(args.technician_id)
            .map(|s| s.id)
            .ok_or_else(|| {
                AppError::NoActiveSession(format!(
                    "technician '{}' has no open session",
                    args.technician_id
                ))
            })?;
        let ticket_id = data
            .sessions
            .get(&session_id)
            .map(|s| s.ticket_id.clone())
            .ok_or_else(|| internal_error("open session vanished during clock-out"))?;

        let ticket = data
            .active_ticket(&ticket_id)
            .cloned()
            .ok_or_else(|| ticket_not_found(&ticket_id))?;

        // merge del ledger dentro de la sección atómica: dos clock-outs
        // concurrentes sobre la misma inspección se serializan aquí
        let outcome = if let Some(inspection_id) = ticket.inspection_id {
            let inspection = data
                .inspections
                .get_mut(&inspection_id)
                .ok_or_else(|| not_found_error("inspection", &inspection_id.to_string()))?;
            inspection_ledger::merge(inspection, &args.resolutions, &args.new_issues)
        } else {
            MergeOutcome {
                items_fixed: 0,
                remaining_open: 0,
            }
        };

        let new_status = ticket.status.after_clock_out(outcome.items_fixed, outcome.remaining_open);

        let payload = serde_json::json!({
            "resolutions": args.resolutions,
            "new_issues": args.new_issues,
            "notes": args.notes,
        });

        let session = data
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| internal_error("open session vanished during clock-out"))?;
        session.ended_at = Some(args.ended_at);
        session.resolutions = Some(payload);
        session.notes = args.notes.clone();
        let session = session.clone();

        let ticket = data
            .tickets
            .get_mut(&ticket_id)
            .ok_or_else(|| ticket_not_found(&ticket_id))?;
        ticket.status = new_status;
        let ticket = ticket.clone();

        Ok(ClockOutRecord {
            session,
            ticket,
            outcome,
        })
    }

    async fn request_parts(
        &self,
        part: Part,
        ticket_status: TicketStatus,
        log: TimeLog,
    ) -> AppResult<Part> {
        let mut data = self.data.lock().await;

        let ticket = data
            .tickets
            .get_mut(&part.ticket_id)
            .filter(|t| !t.deleted)
            .ok_or_else(|| ticket_not_found(&part.ticket_id))?;
        ticket.status = ticket_status;

        data.parts.insert(part.id, part.clone());
        data.sessions.insert(log.id, log);
        Ok(part)
    }

    async fn confirm_parts(
        &self,
        ticket_id: &str,
        ticket_status: TicketStatus,
        vehicle_status: VehicleStatus,
        log: TimeLog,
    ) -> AppResult<u64> {
        let mut data = self.data.lock().await;

        let ticket = data
            .tickets
            .get_mut(ticket_id)
            .filter(|t| !t.deleted)
            .ok_or_else(|| ticket_not_found(ticket_id))?;
        ticket.status = ticket_status;
        let vehicle_id = ticket.vehicle_id;

        if let Some(vehicle) = data.vehicles.get_mut(&vehicle_id) {
            vehicle.status = vehicle_status;
        }

        let mut received = 0u64;
        for part in data.parts.values_mut() {
            if part.ticket_id == ticket_id && part.status == PartStatus::Ordered {
                part.status = PartStatus::Received;
                received += 1;
            }
        }

        data.sessions.insert(log.id, log);
        Ok(received)
    }

    async fn set_ticket_status(
        &self,
        ticket_id: &str,
        status: TicketStatus,
        vehicle_status: Option<VehicleStatus>,
        completed_at: Option<DateTime<Utc>>,
    ) -> AppResult<ServiceTicket> {
        let mut data = self.data.lock().await;

        let ticket = data
            .tickets
            .get_mut(ticket_id)
            .filter(|t| !t.deleted)
            .ok_or_else(|| ticket_not_found(ticket_id))?;
        ticket.status = status;
        if completed_at.is_some() {
            ticket.completed_at = completed_at;
        }
        let vehicle_id = ticket.vehicle_id;
        let ticket = ticket.clone();

        if let Some(new_status) = vehicle_status {
            if let Some(vehicle) = data.vehicles.get_mut(&vehicle_id) {
                vehicle.status = new_status;
            }
        }

        Ok(ticket)
    }

    async fn soft_delete_ticket(
        &self,
        ticket_id: &str,
        deleted_by: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut data = self.data.lock().await;

        let ticket = data
            .tickets
            .get_mut(ticket_id)
            .filter(|t| !t.deleted)
            .ok_or_else(|| ticket_not_found(ticket_id))?;
        ticket.deleted = true;
        ticket.deleted_at = Some(at);
        ticket.deleted_by = Some(deleted_by);
        Ok(())
    }
}

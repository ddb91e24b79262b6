//! TimeSessionManager - sesiones de fichaje de técnicos
//!
//! Abre y cierra sesiones de trabajo manteniendo el invariante "como
//! máximo una sesión abierta por técnico". El clock-out es la operación
//! más delicada del sistema: cierre de sesión, merge del ledger y recómputo
//! del estado del ticket commitean como una unidad atómica en el store.

use std::cmp;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::models::auth::Actor;
use crate::models::ticket::ServiceTicket;
use crate::models::time_log::{ClockOutOutcome, ClockOutRequest, SessionKind, TimeLog};
use crate::models::vehicle::VehicleStatus;
use crate::repositories::store::{ClockOutArgs, WorkshopStore};
use crate::services::audit::{record_or_warn, AuditEvent, AuditSink};
use crate::services::permission_gate::{actions, resources, PermissionGate};
use crate::utils::errors::{invalid_transition, ticket_not_found, AppError, AppResult};

/// Gestor de sesiones de fichaje
pub struct TimeSessionManager {
    store: Arc<dyn WorkshopStore>,
    audit: Arc<dyn AuditSink>,
}

impl TimeSessionManager {
    pub fn new(store: Arc<dyn WorkshopStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Clock-in: abre una sesión de trabajo sobre un ticket
    ///
    /// El ticket debe existir y no estar completado ni borrado. La sesión
    /// guarda un snapshot del estado actual del ticket y la apertura
    /// avanza el ticket a `InProgress` (y el vehículo a `InRepair`) si no
    /// había pasado ya de esa etapa. El invariante de sesión única se
    /// re-comprueba en el store; si el técnico ya tiene una sesión abierta
    /// la operación falla con `SessionConflict` en lugar de crear una
    /// segunda.
    pub async fn clock_in(
        &self,
        actor: &Actor,
        ticket_id: &str,
        selected_tasks: Vec<String>,
    ) -> AppResult<TimeLog> {
        PermissionGate::ensure(actor, actions::UPDATE, resources::TIME_LOG)?;

        let ticket = self
            .store
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| ticket_not_found(ticket_id))?;
        PermissionGate::ensure_scope(actor, ticket.tenant_id, ticket.location_id)?;

        if ticket.status.is_completed() {
            return Err(invalid_transition(ticket.status.as_str(), "InProgress"));
        }

        let now = Utc::now();
        let log = TimeLog {
            id: Uuid::new_v4(),
            ticket_id: ticket.id.clone(),
            technician_id: actor.user_id,
            started_at: now,
            ended_at: None,
            kind: SessionKind::Work,
            ticket_status_snapshot: ticket.status,
            selected_tasks: if selected_tasks.is_empty() {
                None
            } else {
                Some(selected_tasks)
            },
            resolutions: None,
            notes: None,
        };

        let created = self
            .store
            .clock_in(log, ticket.status.after_clock_in(), VehicleStatus::InRepair)
            .await?;

        info!(
            "⏱️ Clock-in de '{}' en ticket '{}'",
            actor.username, ticket.id
        );
        record_or_warn(
            self.audit.as_ref(),
            AuditEvent::new(actor, "session.clock_in", "service_ticket", &ticket.id),
        )
        .await;

        Ok(created)
    }

    /// Clock-out: cierra LA sesión abierta del técnico (búsqueda global,
    /// no por ticket) y reporta resoluciones e issues nuevos
    ///
    /// Falla con `NoActiveSession` si no hay sesión abierta; nunca hace
    /// no-op silencioso. El payload de resoluciones se persiste tal cual
    /// en el TimeLog para el historial.
    pub async fn clock_out(
        &self,
        actor: &Actor,
        request: ClockOutRequest,
    ) -> AppResult<ClockOutOutcome> {
        PermissionGate::ensure(actor, actions::UPDATE, resources::TIME_LOG)?;

        let session = self
            .store
            .find_open_session(actor.user_id)
            .await?
            .ok_or_else(|| {
                AppError::NoActiveSession(format!(
                    "technician '{}' has no open session to close",
                    actor.username
                ))
            })?;

        let ticket = self
            .store
            .get_ticket(&session.ticket_id)
            .await?
            .ok_or_else(|| ticket_not_found(&session.ticket_id))?;
        PermissionGate::ensure_scope(actor, ticket.tenant_id, ticket.location_id)?;

        let record = self
            .store
            .clock_out(ClockOutArgs {
                technician_id: actor.user_id,
                ended_at: Utc::now(),
                resolutions: request.resolutions,
                new_issues: request.new_issues,
                notes: request.notes,
            })
            .await?;

        info!(
            "⏱️ Clock-out de '{}' en ticket '{}': {} arreglados, {} abiertos",
            actor.username,
            record.ticket.id,
            record.outcome.items_fixed,
            record.outcome.remaining_open
        );
        record_or_warn(
            self.audit.as_ref(),
            AuditEvent::new(actor, "session.clock_out", "service_ticket", &record.ticket.id)
                .with_detail(format!(
                    "fixed={} remaining={} status={}",
                    record.outcome.items_fixed,
                    record.outcome.remaining_open,
                    record.ticket.status.as_str()
                )),
        )
        .await;

        Ok(ClockOutOutcome {
            ticket_status: record.ticket.status,
            items_fixed: record.outcome.items_fixed,
            remaining_open: record.outcome.remaining_open,
        })
    }

    /// Tiempo de reparación de un ticket: suma de las sesiones de trabajo
    /// (las entradas instantáneas de cambio de estado no cuentan)
    pub async fn repair_time(&self, ticket_id: &str, now: DateTime<Utc>) -> AppResult<Duration> {
        let sessions = self.store.sessions_for_ticket(ticket_id).await?;
        Ok(sessions
            .iter()
            .filter(|s| s.kind == SessionKind::Work)
            .fold(Duration::zero(), |acc, s| acc + s.elapsed(now)))
    }

    /// Tiempo de espera: vida total del ticket menos tiempo de reparación,
    /// acotado en cero
    pub async fn waiting_time(&self, ticket_id: &str, now: DateTime<Utc>) -> AppResult<Duration> {
        let ticket = self
            .store
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| ticket_not_found(ticket_id))?;
        let repair = self.repair_time(ticket_id, now).await?;
        Ok(compute_waiting(&ticket, repair, now))
    }
}

/// `(completion ?? now) - created_at - repair`, con floor en cero
fn compute_waiting(ticket: &ServiceTicket, repair: Duration, now: DateTime<Utc>) -> Duration {
    let end = ticket.completed_at.unwrap_or(now);
    let total = end - ticket.created_at;
    cmp::max(total - repair, Duration::zero())
}

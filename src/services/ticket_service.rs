//! TicketStateMachine - máquina de estados de tickets de servicio
//!
//! Dueña de las transiciones válidas de estado, de los efectos sobre el
//! vehículo y de las operaciones create / request-parts / confirm-parts /
//! complete / QC / delete. Toda mutación multi-entidad va en una operación
//! compuesta del store (atómica); los eventos de workflow se publican solo
//! DESPUÉS del commit, y un fallo de subscriber nunca revierte nada.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info};
use uuid::Uuid;
use validator::Validate;

use crate::events::WorkflowEventBus;
use crate::models::auth::Actor;
use crate::models::events::{TicketCompletedEvent, TICKET_COMPLETED};
use crate::models::part::{Part, PartStatus, RequestPartsRequest};
use crate::models::ticket::{
    generate_ticket_id, CompleteOutcome, CreateTicketRequest, ServiceTicket, TicketStatus,
};
use crate::models::time_log::{SessionKind, TimeLog};
use crate::models::vehicle::VehicleStatus;
use crate::repositories::store::WorkshopStore;
use crate::services::audit::{record_or_warn, AuditEvent, AuditSink};
use crate::services::permission_gate::{actions, resources, PermissionGate};
use crate::utils::errors::{
    invalid_transition, not_found_error, ticket_not_found, validation_error, AppError, AppResult,
};

/// Máquina de estados de tickets de servicio
pub struct TicketStateMachine {
    store: Arc<dyn WorkshopStore>,
    bus: Arc<WorkflowEventBus>,
    audit: Arc<dyn AuditSink>,
}

impl TicketStateMachine {
    pub fn new(
        store: Arc<dyn WorkshopStore>,
        bus: Arc<WorkflowEventBus>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { store, bus, audit }
    }

    /// Crea un ticket en `Queue` y marca el vehículo como `Inspected`
    ///
    /// El id se deriva del sufijo del VIN más el timestamp de creación.
    /// Solo puede haber un ticket activo por vehículo y lane de tipo; un
    /// segundo create en la misma lane es un error de validación.
    pub async fn create(
        &self,
        actor: &Actor,
        request: CreateTicketRequest,
    ) -> AppResult<ServiceTicket> {
        self.create_inner(actor, request, Some(VehicleStatus::Inspected))
            .await
    }

    /// Creación follow-on desde un subscriber de workflow: mismo flujo que
    /// `create` pero preserva el estado actual del vehículo (un detailing
    /// encadenado no devuelve el vehículo a `Inspected`)
    pub(crate) async fn create_follow_on(
        &self,
        actor: &Actor,
        request: CreateTicketRequest,
    ) -> AppResult<ServiceTicket> {
        self.create_inner(actor, request, None).await
    }

    async fn create_inner(
        &self,
        actor: &Actor,
        request: CreateTicketRequest,
        vehicle_status: Option<VehicleStatus>,
    ) -> AppResult<ServiceTicket> {
        PermissionGate::ensure(actor, actions::CREATE, resources::SERVICE_TICKET)?;
        request.validate()?;

        let vehicle = self
            .store
            .get_vehicle(request.vehicle_id)
            .await?
            .ok_or_else(|| not_found_error("vehicle", &request.vehicle_id.to_string()))?;
        PermissionGate::ensure_scope(actor, vehicle.tenant_id, vehicle.location_id)?;

        if self
            .store
            .find_active_ticket(vehicle.id, request.ticket_type)
            .await?
            .is_some()
        {
            return Err(validation_error(
                "ticket_type",
                "an active ticket already exists for this vehicle in this lane",
            ));
        }

        // dos tickets del mismo vehículo en el mismo milisegundo chocarían
        // de id; se avanza el timestamp hasta encontrar uno libre, y si el
        // store rechaza igualmente el id (create concurrente del mismo
        // vehículo en otra lane) se regenera y reintenta
        let mut now = Utc::now();
        let created = loop {
            let mut id = generate_ticket_id(&vehicle.vin, now);
            while self.store.ticket_exists(&id).await? {
                now += chrono::Duration::milliseconds(1);
                id = generate_ticket_id(&vehicle.vin, now);
            }

            let ticket = ServiceTicket {
                id,
                tenant_id: vehicle.tenant_id,
                location_id: vehicle.location_id,
                vehicle_id: vehicle.id,
                description: request.description.clone(),
                status: TicketStatus::Queue,
                assigned_to: None,
                process_notes: None,
                difficulty: request.difficulty,
                inspection_id: request.inspection_id,
                ticket_type: request.ticket_type,
                deleted: false,
                deleted_at: None,
                deleted_by: None,
                created_at: now,
                completed_at: None,
            };

            match self.store.create_ticket(ticket, vehicle_status).await {
                Ok(created) => break created,
                Err(AppError::DuplicateTicketId(_)) => {
                    now += chrono::Duration::milliseconds(1);
                }
                Err(e) => return Err(e),
            }
        };

        info!(
            "🎫 Ticket '{}' creado ({}) para vehículo {}",
            created.id,
            created.ticket_type.as_str(),
            created.vehicle_id
        );
        record_or_warn(
            self.audit.as_ref(),
            AuditEvent::new(actor, "ticket.create", "service_ticket", &created.id)
                .with_detail(format!("type={}", created.ticket_type.as_str())),
        )
        .await;

        Ok(created)
    }

    /// Pide un repuesto: `InProgress → WaitingParts`, crea el Part en
    /// `Ordered` y deja un log instantáneo de cambio de estado
    pub async fn request_parts(
        &self,
        actor: &Actor,
        ticket_id: &str,
        request: RequestPartsRequest,
    ) -> AppResult<Part> {
        PermissionGate::ensure(actor, actions::UPDATE, resources::SERVICE_TICKET)?;
        request.validate()?;

        let ticket = self.load_scoped_ticket(actor, ticket_id).await?;
        if ticket.status != TicketStatus::InProgress {
            return Err(invalid_transition(ticket.status.as_str(), "WaitingParts"));
        }

        let now = Utc::now();
        let part = Part {
            id: Uuid::new_v4(),
            ticket_id: ticket.id.clone(),
            description: request.description.clone(),
            status: PartStatus::Ordered,
            cost: request.cost.unwrap_or(Decimal::ZERO),
            created_at: now,
        };
        let log = self.status_change_log(
            actor,
            &ticket,
            format!("Parts requested: {}", request.description),
        );

        let part = self
            .store
            .request_parts(part, TicketStatus::WaitingParts, log)
            .await?;

        record_or_warn(
            self.audit.as_ref(),
            AuditEvent::new(actor, "ticket.request_parts", "service_ticket", &ticket.id)
                .with_detail(part.description.clone()),
        )
        .await;

        Ok(part)
    }

    /// Confirma la recepción de repuestos: `WaitingParts → InProgress`,
    /// pasa en bloque los parts `Ordered` a `Received` y el vehículo
    /// vuelve a `InRepair`
    pub async fn confirm_parts_received(&self, actor: &Actor, ticket_id: &str) -> AppResult<()> {
        PermissionGate::ensure(actor, actions::UPDATE, resources::SERVICE_TICKET)?;

        let ticket = self.load_scoped_ticket(actor, ticket_id).await?;
        if ticket.status != TicketStatus::WaitingParts {
            return Err(invalid_transition(ticket.status.as_str(), "InProgress"));
        }

        let log = self.status_change_log(actor, &ticket, "Parts received".to_string());
        let received = self
            .store
            .confirm_parts(
                &ticket.id,
                TicketStatus::InProgress,
                VehicleStatus::InRepair,
                log,
            )
            .await?;

        info!("📦 {} parts recibidos en ticket '{}'", received, ticket.id);
        record_or_warn(
            self.audit.as_ref(),
            AuditEvent::new(actor, "ticket.confirm_parts", "service_ticket", &ticket.id)
                .with_detail(format!("received={}", received)),
        )
        .await;

        Ok(())
    }

    /// El toggle de completado: desde `QualityControl` pasa a `Completed`
    /// (y el vehículo a su estado terminal por tipo de ticket); desde
    /// cualquier otro estado activo pasa a `QualityControl` (submit-for-QC)
    ///
    /// El bypass de manager NO va por aquí: es `force_complete`, una
    /// operación aparte con su propio permiso.
    pub async fn complete(&self, actor: &Actor, ticket_id: &str) -> AppResult<CompleteOutcome> {
        PermissionGate::ensure(actor, actions::UPDATE, resources::SERVICE_TICKET)?;

        let ticket = self.load_scoped_ticket(actor, ticket_id).await?;
        match ticket.status {
            TicketStatus::Completed => {
                Err(invalid_transition(ticket.status.as_str(), "Completed"))
            }
            TicketStatus::QualityControl => {
                let updated = self
                    .store
                    .set_ticket_status(
                        &ticket.id,
                        TicketStatus::Completed,
                        Some(ticket.ticket_type.terminal_vehicle_status()),
                        Some(Utc::now()),
                    )
                    .await?;

                record_or_warn(
                    self.audit.as_ref(),
                    AuditEvent::new(actor, "ticket.complete", "service_ticket", &updated.id),
                )
                .await;
                self.publish_completed(actor, &updated).await;

                Ok(CompleteOutcome {
                    new_status: TicketStatus::Completed,
                })
            }
            _ => {
                let updated = self
                    .store
                    .set_ticket_status(&ticket.id, TicketStatus::QualityControl, None, None)
                    .await?;

                record_or_warn(
                    self.audit.as_ref(),
                    AuditEvent::new(actor, "ticket.submit_qc", "service_ticket", &updated.id),
                )
                .await;

                Ok(CompleteOutcome {
                    new_status: TicketStatus::QualityControl,
                })
            }
        }
    }

    /// Bypass explícito de manager: salta directo a `Completed` desde
    /// cualquier estado no terminal. Requiere su propia autorización
    /// (`force_complete:service_ticket`); nunca se llega aquí vía el toggle.
    pub async fn force_complete(
        &self,
        actor: &Actor,
        ticket_id: &str,
    ) -> AppResult<CompleteOutcome> {
        PermissionGate::ensure(actor, actions::FORCE_COMPLETE, resources::SERVICE_TICKET)?;

        let ticket = self.load_scoped_ticket(actor, ticket_id).await?;
        if ticket.status.is_completed() {
            return Err(invalid_transition(ticket.status.as_str(), "Completed"));
        }

        let updated = self
            .store
            .set_ticket_status(
                &ticket.id,
                TicketStatus::Completed,
                Some(ticket.ticket_type.terminal_vehicle_status()),
                Some(Utc::now()),
            )
            .await?;

        record_or_warn(
            self.audit.as_ref(),
            AuditEvent::new(actor, "ticket.force_complete", "service_ticket", &updated.id)
                .with_detail(format!("from={}", ticket.status.as_str())),
        )
        .await;
        self.publish_completed(actor, &updated).await;

        Ok(CompleteOutcome {
            new_status: TicketStatus::Completed,
        })
    }

    /// Operación legacy de QC: `QualityControl → Completed` con el
    /// vehículo a `Repaired` y entrada de auditoría de QC aprobado
    pub async fn confirm_quality_control(&self, actor: &Actor, ticket_id: &str) -> AppResult<()> {
        PermissionGate::ensure(actor, actions::UPDATE, resources::SERVICE_TICKET)?;

        let ticket = self.load_scoped_ticket(actor, ticket_id).await?;
        if ticket.status != TicketStatus::QualityControl {
            return Err(invalid_transition(ticket.status.as_str(), "Completed"));
        }

        let updated = self
            .store
            .set_ticket_status(
                &ticket.id,
                TicketStatus::Completed,
                Some(VehicleStatus::Repaired),
                Some(Utc::now()),
            )
            .await?;

        info!("✅ QC aprobado en ticket '{}'", updated.id);
        record_or_warn(
            self.audit.as_ref(),
            AuditEvent::new(actor, "qc.pass", "service_ticket", &updated.id),
        )
        .await;
        self.publish_completed(actor, &updated).await;

        Ok(())
    }

    /// Soft-delete: el ticket desaparece de todas las queries activas; sus
    /// time logs y parts quedan intactos
    pub async fn delete(&self, actor: &Actor, ticket_id: &str) -> AppResult<()> {
        PermissionGate::ensure(actor, actions::DELETE, resources::SERVICE_TICKET)?;

        let ticket = self.load_scoped_ticket(actor, ticket_id).await?;
        if ticket.status.is_completed() {
            return Err(invalid_transition(ticket.status.as_str(), "Deleted"));
        }

        self.store
            .soft_delete_ticket(&ticket.id, actor.user_id, Utc::now())
            .await?;

        record_or_warn(
            self.audit.as_ref(),
            AuditEvent::new(actor, "ticket.delete", "service_ticket", &ticket.id),
        )
        .await;

        Ok(())
    }

    // --- helpers ---

    async fn load_scoped_ticket(&self, actor: &Actor, ticket_id: &str) -> AppResult<ServiceTicket> {
        let ticket = self
            .store
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| ticket_not_found(ticket_id))?;
        PermissionGate::ensure_scope(actor, ticket.tenant_id, ticket.location_id)?;
        Ok(ticket)
    }

    /// Entrada instantánea de cambio de estado (no es trabajo productivo)
    fn status_change_log(&self, actor: &Actor, ticket: &ServiceTicket, notes: String) -> TimeLog {
        let now = Utc::now();
        TimeLog {
            id: Uuid::new_v4(),
            ticket_id: ticket.id.clone(),
            technician_id: actor.user_id,
            started_at: now,
            ended_at: Some(now),
            kind: SessionKind::StatusChange,
            ticket_status_snapshot: ticket.status,
            selected_tasks: None,
            resolutions: None,
            notes: Some(notes),
        }
    }

    /// Publica `TICKET_COMPLETED` tras el commit; el bus se traga los
    /// fallos de los subscribers
    async fn publish_completed(&self, actor: &Actor, ticket: &ServiceTicket) {
        let event = TicketCompletedEvent {
            ticket_id: ticket.id.clone(),
            vehicle_id: ticket.vehicle_id,
            ticket_type: ticket.ticket_type,
            actor: actor.clone(),
        };
        match serde_json::to_value(&event) {
            Ok(payload) => self.bus.publish(TICKET_COMPLETED, payload).await,
            Err(e) => error!("Error serializando TICKET_COMPLETED: {}", e),
        }
    }
}

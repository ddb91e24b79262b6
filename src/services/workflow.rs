//! Subscribers de workflow - creación automática de tickets
//!
//! El pipeline de reparación de un vehículo avanza por eventos: una
//! inspección terminada crea el ticket de recon, y un recon completado
//! crea el ticket de detailing. El código de inspecciones no depende del
//! de tickets: la unión pasa por el `WorkflowEventBus`.
//!
//! El paso detailing → client-repair es una puerta manual a propósito: lo
//! crea la UI con confirmación explícita del usuario, nunca un subscriber.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::events::{EventSubscriber, WorkflowEventBus};
use crate::models::auth::Actor;
use crate::models::events::{
    InspectionCompletedEvent, TicketCompletedEvent, INSPECTION_COMPLETED, TICKET_COMPLETED,
};
use crate::models::ticket::{CreateTicketRequest, TicketType};
use crate::repositories::store::WorkshopStore;
use crate::services::inspection_ledger;
use crate::services::ticket_service::TicketStateMachine;
use crate::utils::errors::{internal_error, not_found_error, AppResult};

/// Registra los subscribers del pipeline en el bus. Solo en el arranque.
pub fn register_workflows(
    bus: &WorkflowEventBus,
    store: Arc<dyn WorkshopStore>,
    tickets: Arc<TicketStateMachine>,
) {
    bus.subscribe(
        INSPECTION_COMPLETED,
        Arc::new(ReconTicketWorkflow {
            store: store.clone(),
            tickets: tickets.clone(),
        }),
    );
    bus.subscribe(TICKET_COMPLETED, Arc::new(DetailingTicketWorkflow { store, tickets }));
}

/// `INSPECTION_COMPLETED` → ticket de recon si hay algo que reparar
pub struct ReconTicketWorkflow {
    store: Arc<dyn WorkshopStore>,
    tickets: Arc<TicketStateMachine>,
}

#[async_trait]
impl EventSubscriber for ReconTicketWorkflow {
    fn name(&self) -> &'static str {
        "recon-ticket-workflow"
    }

    async fn handle(&self, payload: serde_json::Value) -> AppResult<()> {
        let event: InspectionCompletedEvent = serde_json::from_value(payload)
            .map_err(|e| internal_error(&format!("malformed INSPECTION_COMPLETED payload: {}", e)))?;

        let inspection = self
            .store
            .get_inspection(event.inspection_id)
            .await?
            .ok_or_else(|| not_found_error("inspection", &event.inspection_id.to_string()))?;

        // el resumen se re-deriva del ledger persistido, no del payload
        let Some(summary) = inspection_ledger::summarize(&inspection) else {
            info!(
                "🔍 Inspección {} sin hallazgos abiertos; no se crea ticket",
                event.inspection_id
            );
            return Ok(());
        };

        let vehicle = self
            .store
            .get_vehicle(event.vehicle_id)
            .await?
            .ok_or_else(|| not_found_error("vehicle", &event.vehicle_id.to_string()))?;

        if vehicle.is_sold() {
            // vehículo vendido: el camino es un ticket ClientRequest creado
            // por la UI tras confirmación explícita, no automático
            info!(
                "🔍 Vehículo {} vendido; recon queda a criterio del cliente",
                vehicle.id
            );
            return Ok(());
        }

        let actor = Actor::system(vehicle.tenant_id, vehicle.location_id);
        let ticket = self
            .tickets
            .create(
                &actor,
                CreateTicketRequest {
                    vehicle_id: vehicle.id,
                    description: summary,
                    inspection_id: Some(inspection.id),
                    ticket_type: TicketType::Recon,
                    priority: Some(event.priority),
                    difficulty: None,
                },
            )
            .await?;

        info!(
            "🔁 Ticket de recon '{}' creado desde inspección {}",
            ticket.id, inspection.id
        );
        Ok(())
    }
}

/// `TICKET_COMPLETED` de un recon → ticket de detailing
pub struct DetailingTicketWorkflow {
    store: Arc<dyn WorkshopStore>,
    tickets: Arc<TicketStateMachine>,
}

#[async_trait]
impl EventSubscriber for DetailingTicketWorkflow {
    fn name(&self) -> &'static str {
        "detailing-ticket-workflow"
    }

    async fn handle(&self, payload: serde_json::Value) -> AppResult<()> {
        let event: TicketCompletedEvent = serde_json::from_value(payload)
            .map_err(|e| internal_error(&format!("malformed TICKET_COMPLETED payload: {}", e)))?;

        // solo el cierre de un recon encadena detailing
        if event.ticket_type != TicketType::Recon {
            return Ok(());
        }

        let vehicle = self
            .store
            .get_vehicle(event.vehicle_id)
            .await?
            .ok_or_else(|| not_found_error("vehicle", &event.vehicle_id.to_string()))?;

        if vehicle.is_sold() {
            return Ok(());
        }

        let actor = Actor::system(vehicle.tenant_id, vehicle.location_id);
        let ticket = self
            .tickets
            .create_follow_on(
                &actor,
                CreateTicketRequest {
                    vehicle_id: vehicle.id,
                    description: format!("Post-recon detailing (after ticket {})", event.ticket_id),
                    inspection_id: None,
                    ticket_type: TicketType::Detailing,
                    priority: None,
                    difficulty: None,
                },
            )
            .await?;

        info!(
            "🔁 Ticket de detailing '{}' creado tras recon '{}'",
            ticket.id, event.ticket_id
        );
        Ok(())
    }
}

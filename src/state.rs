//! Shared application state
//!
//! Este módulo arma el estado compartido del motor de workflow: store,
//! bus de eventos, audit sink y los dos services principales. La capa web
//! (fuera de esta librería) lo construye una vez en el arranque y lo
//! comparte entre requests.

use std::sync::Arc;

use tracing::info;

use crate::config::environment::EnvironmentConfig;
use crate::events::WorkflowEventBus;
use crate::repositories::{MemoryStore, PgStore, WorkshopStore};
use crate::services::audit::{AuditSink, TracingAuditSink};
use crate::services::ticket_service::TicketStateMachine;
use crate::services::time_session::TimeSessionManager;
use crate::services::workflow;
use crate::utils::errors::{internal_error, AppResult};

/// Estado compartido del motor de workflow
#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub store: Arc<dyn WorkshopStore>,
    pub bus: Arc<WorkflowEventBus>,
    pub audit: Arc<dyn AuditSink>,
    pub tickets: Arc<TicketStateMachine>,
    pub sessions: Arc<TimeSessionManager>,
}

impl AppState {
    /// Cablea services, bus y subscribers sobre un store ya construido
    ///
    /// Los subscribers de workflow se registran aquí y el bus no se vuelve
    /// a mutar: después del arranque es solo-lectura.
    pub fn new(
        config: EnvironmentConfig,
        store: Arc<dyn WorkshopStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let bus = Arc::new(WorkflowEventBus::new());
        let tickets = Arc::new(TicketStateMachine::new(
            store.clone(),
            bus.clone(),
            audit.clone(),
        ));
        let sessions = Arc::new(TimeSessionManager::new(store.clone(), audit.clone()));

        workflow::register_workflows(&bus, store.clone(), tickets.clone());

        info!("🔧 Workshop service inicializado ({})", config.environment);

        Self {
            config,
            store,
            bus,
            audit,
            tickets,
            sessions,
        }
    }

    /// Estado de producción contra PostgreSQL (`DATABASE_URL`)
    pub async fn with_postgres(config: EnvironmentConfig) -> AppResult<Self> {
        let url = config
            .database_url
            .clone()
            .ok_or_else(|| internal_error("DATABASE_URL is not configured"))?;
        let store = Arc::new(PgStore::connect(&url).await?);
        Ok(Self::new(config, store, Arc::new(TracingAuditSink)))
    }

    /// Estado in-memory para tests y entornos efímeros
    pub fn in_memory(config: EnvironmentConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()), Arc::new(TracingAuditSink))
    }
}

//! SystemLogger - audit trail de eventos de workflow
//!
//! Colaborador append-only con una sola llamada `record(event)`. Un fallo
//! al registrar auditoría JAMÁS aborta la operación de negocio que lo
//! disparó: los services registran vía `record_or_warn`, que loggea el
//! error y sigue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::models::auth::Actor;
use crate::utils::errors::AppResult;

/// Entrada del audit trail
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub actor: String,
    pub action: String,
    pub entity_kind: String,
    pub entity_id: String,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(actor: &Actor, action: &str, entity_kind: &str, entity_id: &str) -> Self {
        Self {
            actor: actor.username.clone(),
            action: action.to_string(),
            entity_kind: entity_kind.to_string(),
            entity_id: entity_id.to_string(),
            detail: None,
            at: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Sink de auditoría (colaborador externo en producción)
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> AppResult<()>;
}

/// Registra tragándose el error: la auditoría nunca rompe el negocio
pub async fn record_or_warn(sink: &dyn AuditSink, event: AuditEvent) {
    let action = event.action.clone();
    if let Err(e) = sink.record(event).await {
        warn!("⚠️ Audit log falló para '{}': {}", action, e);
    }
}

/// Sink por defecto: escribe el evento al log estructurado
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> AppResult<()> {
        info!(
            target: "audit",
            actor = %event.actor,
            action = %event.action,
            entity = %format!("{}:{}", event.entity_kind, event.entity_id),
            detail = event.detail.as_deref().unwrap_or(""),
            "audit"
        );
        Ok(())
    }
}

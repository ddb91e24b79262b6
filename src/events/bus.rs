//! WorkflowEventBus - publish/subscribe intra-proceso
//!
//! Registro de subscribers por tipo de evento (string). No hay
//! persistencia ni transporte externo: es desacoplamiento dentro del
//! proceso para que el código de inspecciones no dependa del de tickets.
//!
//! Semántica fire-and-forget: un fallo de subscriber se loggea y jamás se
//! propaga al publisher; un error en el workflow downstream no revierte el
//! guardado de la inspección que lo disparó.
//!
//! Los subscribers se registran solo durante el arranque y después el bus
//! solo se lee; el RwLock existe únicamente por seguridad del orden de
//! inicialización.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::utils::errors::AppResult;

/// Callback asíncrono suscrito a un tipo de evento
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Nombre del subscriber para los logs
    fn name(&self) -> &'static str;

    async fn handle(&self, payload: serde_json::Value) -> AppResult<()>;
}

/// Bus de eventos in-memory del proceso
#[derive(Default)]
pub struct WorkflowEventBus {
    subscribers: RwLock<HashMap<String, Vec<Arc<dyn EventSubscriber>>>>,
}

impl WorkflowEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un subscriber para un tipo de evento. Solo en el arranque.
    pub fn subscribe(&self, event_type: &str, subscriber: Arc<dyn EventSubscriber>) {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        debug!(
            "📬 Subscriber '{}' registrado para '{}'",
            subscriber.name(),
            event_type
        );
        subscribers
            .entry(event_type.to_string())
            .or_default()
            .push(subscriber);
    }

    /// Publica un evento a todos los subscribers de ese tipo
    ///
    /// Los errores de cada subscriber se capturan y loggean; el publisher
    /// nunca ve el fallo ni espera de forma distinta por él.
    pub async fn publish(&self, event_type: &str, payload: serde_json::Value) {
        let targets: Vec<Arc<dyn EventSubscriber>> = {
            let subscribers = self
                .subscribers
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match subscribers.get(event_type) {
                Some(list) => list.clone(),
                None => {
                    debug!("Evento '{}' sin subscribers", event_type);
                    return;
                }
            }
        };

        let dispatches = targets.iter().map(|subscriber| {
            let payload = payload.clone();
            async move {
                if let Err(e) = subscriber.handle(payload).await {
                    warn!(
                        "⚠️ Subscriber '{}' falló procesando '{}': {}",
                        subscriber.name(),
                        event_type,
                        e
                    );
                }
            }
        });

        join_all(dispatches).await;
    }

    /// Subscribers registrados para un tipo (enumerables, para tests y debug)
    pub fn subscriber_names(&self, event_type: &str) -> Vec<&'static str> {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers
            .get(event_type)
            .map(|list| list.iter().map(|s| s.name()).collect())
            .unwrap_or_default()
    }
}

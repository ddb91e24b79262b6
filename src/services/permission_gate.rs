//! PermissionGate - autorización sí/no
//!
//! Chequeo binario sobre el set de permisos del actor. Toda operación
//! mutante del motor lo consulta ANTES de cualquier efecto colateral y
//! falla rápido con `PermissionDenied`. El scoping de tenant/location va
//! aparte (`ensure_scope`) y produce `AccessDenied`.

use uuid::Uuid;

use crate::models::auth::Actor;
use crate::utils::errors::{AppError, AppResult};

/// Acciones conocidas del motor
pub mod actions {
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const FORCE_COMPLETE: &str = "force_complete";
}

/// Recursos conocidos del motor
pub mod resources {
    pub const SERVICE_TICKET: &str = "service_ticket";
    pub const TIME_LOG: &str = "time_log";
}

/// Gate de permisos del workflow
pub struct PermissionGate;

impl PermissionGate {
    /// `true` si el actor tiene `manage:all`, `manage:<resource>` o el
    /// permiso exacto `<action>:<resource>`
    pub fn allow(actor: &Actor, action: &str, resource: &str) -> bool {
        let manage_resource = format!("manage:{}", resource);
        let exact = format!("{}:{}", action, resource);
        actor
            .permissions
            .iter()
            .any(|p| p == "manage:all" || *p == manage_resource || *p == exact)
    }

    /// Versión que falla rápido nombrando la regla violada
    pub fn ensure(actor: &Actor, action: &str, resource: &str) -> AppResult<()> {
        if Self::allow(actor, action, resource) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(format!(
                "user '{}' lacks permission '{}:{}'",
                actor.username, action, resource
            )))
        }
    }

    /// Scoping de tenant/location: el actor solo opera sobre entidades de
    /// su propio tenant y location
    pub fn ensure_scope(actor: &Actor, tenant_id: Uuid, location_id: Uuid) -> AppResult<()> {
        if actor.tenant_id != tenant_id {
            return Err(AppError::AccessDenied(format!(
                "user '{}' cannot access resources of another tenant",
                actor.username
            )));
        }
        if actor.location_id != location_id {
            return Err(AppError::AccessDenied(format!(
                "user '{}' cannot access resources of another location",
                actor.username
            )));
        }
        Ok(())
    }
}

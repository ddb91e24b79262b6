//! Actor y permisos
//!
//! Toda operación del motor recibe un `Actor`: el usuario autenticado con
//! su set de permisos y su scoping de tenant/location. La autenticación en
//! sí (JWT, sesión) vive fuera de esta librería.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Usuario que ejecuta una operación del workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub username: String,
    pub permissions: Vec<String>,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
}

impl Actor {
    /// Actor interno del sistema para los subscribers de workflow
    pub fn system(tenant_id: Uuid, location_id: Uuid) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            username: "workflow".to_string(),
            permissions: vec!["manage:all".to_string()],
            tenant_id,
            location_id,
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

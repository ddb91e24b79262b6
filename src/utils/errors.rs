//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del motor de workflow.
//! Cada operación devuelve fallos tipados; nada se traga dentro de la
//! máquina de estados ni del gestor de sesiones (las únicas excepciones
//! son el dispatch del event bus y el audit log, ver sus módulos).

use thiserror::Error;

/// Errores principales del motor de workflow
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No active session: {0}")]
    NoActiveSession(String),

    #[error("Session conflict: {0}")]
    SessionConflict(String),

    #[error("Invalid transition: cannot move from '{from}' to '{attempted}'")]
    InvalidTransition { from: String, attempted: String },

    /// Colisión del id legible (VIN + timestamp); el caller regenera el id
    /// y reintenta, nunca llega a la capa de UI
    #[error("Duplicate ticket id: {0}")]
    DuplicateTicketId(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de validación
pub fn validation_error(field: &'static str, message: &'static str) -> AppError {
    use validator::ValidationError;

    let mut error = ValidationError::new("custom");
    error.add_param("field".into(), &field);
    error.add_param("message".into(), &message);

    let mut errors = validator::ValidationErrors::new();
    errors.add(field, error);

    AppError::Validation(errors)
}

/// Función helper para ticket inexistente o borrado (soft-delete)
pub fn ticket_not_found(ticket_id: &str) -> AppError {
    AppError::TicketNotFound(format!("ticket '{}' does not exist or was deleted", ticket_id))
}

/// Función helper para recursos que no son tickets
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para transiciones de estado no permitidas
pub fn invalid_transition(from: &str, attempted: &str) -> AppError {
    AppError::InvalidTransition {
        from: from.to_string(),
        attempted: attempted.to_string(),
    }
}

/// Función helper para errores internos
pub fn internal_error(message: &str) -> AppError {
    AppError::Internal(message.to_string())
}

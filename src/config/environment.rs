//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y variables de configuración.
//! Al ser una librería embebida en el backend, todos los valores tienen
//! defaults razonables en lugar de abortar al faltar una variable.

use std::env;

use dotenvy::dotenv;
use tracing::Level;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub database_url: Option<String>,
    pub log_level: String,
}

impl EnvironmentConfig {
    /// Carga la configuración desde variables de entorno (con `.env` si existe)
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            database_url: env::var("DATABASE_URL").ok(),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Configuración mínima para tests (sin tocar el entorno del proceso)
    pub fn for_tests() -> Self {
        Self {
            environment: "test".to_string(),
            database_url: None,
            log_level: "debug".to_string(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Nivel de tracing derivado de `LOG_LEVEL`
    pub fn tracing_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// Inicializa el subscriber global de tracing (idempotente)
    pub fn init_tracing(&self) {
        let _ = tracing_subscriber::fmt()
            .with_max_level(self.tracing_level())
            .try_init();
    }
}

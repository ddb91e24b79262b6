//! Workshop Service - Motor de workflow de tickets de servicio
//!
//! Núcleo del taller de la aplicación de concesionario: máquina de estados
//! de tickets de servicio, sesiones de fichaje de técnicos, conciliación de
//! inspecciones (recon) y el bus de eventos de workflow que encadena la
//! creación automática de tickets (recon → detailing).
//!
//! La capa HTTP/UI consume esta librería; aquí no hay router ni rendering.

pub mod config;
pub mod events;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod utils;

pub use state::AppState;
pub use utils::errors::{AppError, AppResult};

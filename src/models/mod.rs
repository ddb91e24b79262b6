//! Modelos del sistema
//!
//! Este módulo contiene todos los modelos de datos del motor de workflow:
//! tickets de servicio, sesiones de fichaje, inspecciones, parts y el
//! actor que ejecuta cada operación.

pub mod auth;
pub mod events;
pub mod inspection;
pub mod part;
pub mod ticket;
pub mod time_log;
pub mod vehicle;

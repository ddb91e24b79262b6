//! Services module
//!
//! Este módulo contiene la lógica de negocio del motor de workflow: el
//! gate de permisos, el ledger de inspecciones, el gestor de sesiones de
//! fichaje, la máquina de estados de tickets y los subscribers que
//! encadenan la creación automática de tickets.

pub mod audit;
pub mod inspection_ledger;
pub mod permission_gate;
pub mod ticket_service;
pub mod time_session;
pub mod workflow;

pub use permission_gate::PermissionGate;
pub use ticket_service::TicketStateMachine;
pub use time_session::TimeSessionManager;

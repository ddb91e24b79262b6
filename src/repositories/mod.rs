//! Capa de acceso a datos
//!
//! El motor de workflow habla con el storage a través del trait
//! `WorkshopStore`: lecturas de entidades más operaciones compuestas que
//! cada backend aplica de forma atómica. `PgStore` es el backend de
//! producción (Postgres vía sqlx, una transacción por operación compuesta)
//! y `MemoryStore` la implementación de referencia usada en tests.

pub mod memory_store;
pub mod pg_store;
pub mod store;

pub use memory_store::MemoryStore;
pub use pg_store::PgStore;
pub use store::{ClockOutArgs, ClockOutRecord, WorkshopStore};

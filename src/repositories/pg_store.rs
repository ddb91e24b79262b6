//! PgStore - storage collaborator sobre PostgreSQL
//!
//! Backend de producción vía sqlx. Cada operación compuesta corre en una
//! transacción propia; los invariantes sensibles a carreras se
//! re-comprueban con `SELECT ... FOR UPDATE`:
//! - la unicidad de sesión abierta por técnico (clock-in concurrente →
//!   exactamente un `SessionConflict`),
//! - el blob del ledger de inspección (dos clock-outs concurrentes se
//!   serializan en el row lock, sin last-writer-wins).
//!
//! Tablas esperadas: `vehicles`, `service_tickets`, `time_logs`, `parts`,
//! `inspections`. Los enums van como TEXT con los strings de `as_str()`;
//! checklists, tasks y resoluciones como JSONB. Un `SELECT ... FOR UPDATE`
//! sin filas no bloquea el INSERT de la otra transacción, así que el
//! esquema debe llevar dos índices únicos parciales que conviertan la
//! carrera restante en un error de clave duplicada:
//! - `time_logs (technician_id) WHERE ended_at IS NULL AND kind = 'work'`
//!   (una sesión abierta por técnico),
//! - `service_tickets_active_lane_idx` sobre
//!   `service_tickets (vehicle_id, ticket_type)
//!   WHERE deleted = FALSE AND status <> 'Completed'`
//!   (un ticket activo por vehículo y lane).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::inspection::{
    checklist_from_value, diagnostic_codes_from_value, Inspection, PriorityTier,
};
use crate::models::part::{Part, PartStatus};
use crate::models::ticket::{RepairTier, ServiceTicket, TicketStatus, TicketType};
use crate::models::time_log::{SessionKind, TimeLog};
use crate::models::vehicle::{Vehicle, VehicleStatus};
use crate::repositories::store::{ClockOutArgs, ClockOutRecord, WorkshopStore};
use crate::services::inspection_ledger::{self, MergeOutcome};
use crate::utils::errors::{
    internal_error, not_found_error, ticket_not_found, validation_error, AppError, AppResult,
};

/// Store de producción sobre PostgreSQL
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Abre el pool contra `database_url`
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// --- filas y conversiones ---

#[derive(sqlx::FromRow)]
struct VehicleRow {
    id: Uuid,
    tenant_id: Uuid,
    location_id: Uuid,
    vin: String,
    status: String,
    sold: bool,
    created_at: DateTime<Utc>,
}

impl VehicleRow {
    fn into_model(self) -> AppResult<Vehicle> {
        let status = VehicleStatus::parse(&self.status)
            .ok_or_else(|| internal_error(&format!("unknown vehicle status '{}'", self.status)))?;
        Ok(Vehicle {
            id: self.id,
            tenant_id: self.tenant_id,
            location_id: self.location_id,
            vin: self.vin,
            status,
            sold: self.sold,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: String,
    tenant_id: Uuid,
    location_id: Uuid,
    vehicle_id: Uuid,
    description: String,
    status: String,
    assigned_to: Option<Uuid>,
    process_notes: Option<String>,
    difficulty: Option<String>,
    inspection_id: Option<Uuid>,
    ticket_type: String,
    deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TicketRow {
    fn into_model(self) -> AppResult<ServiceTicket> {
        let status = TicketStatus::parse(&self.status)
            .ok_or_else(|| internal_error(&format!("unknown ticket status '{}'", self.status)))?;
        let ticket_type = TicketType::parse(&self.ticket_type)
            .ok_or_else(|| internal_error(&format!("unknown ticket type '{}'", self.ticket_type)))?;
        let difficulty = match self.difficulty {
            Some(raw) => Some(
                RepairTier::parse(&raw)
                    .ok_or_else(|| internal_error(&format!("unknown repair tier '{}'", raw)))?,
            ),
            None => None,
        };
        Ok(ServiceTicket {
            id: self.id,
            tenant_id: self.tenant_id,
            location_id: self.location_id,
            vehicle_id: self.vehicle_id,
            description: self.description,
            status,
            assigned_to: self.assigned_to,
            process_notes: self.process_notes,
            difficulty,
            inspection_id: self.inspection_id,
            ticket_type,
            deleted: self.deleted,
            deleted_at: self.deleted_at,
            deleted_by: self.deleted_by,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TimeLogRow {
    id: Uuid,
    ticket_id: String,
    technician_id: Uuid,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    kind: String,
    ticket_status_snapshot: String,
    selected_tasks: Option<serde_json::Value>,
    resolutions: Option<serde_json::Value>,
    notes: Option<String>,
}

impl TimeLogRow {
    fn into_model(self) -> AppResult<TimeLog> {
        let kind = SessionKind::parse(&self.kind)
            .ok_or_else(|| internal_error(&format!("unknown session kind '{}'", self.kind)))?;
        let snapshot = TicketStatus::parse(&self.ticket_status_snapshot).ok_or_else(|| {
            internal_error(&format!(
                "unknown ticket status snapshot '{}'",
                self.ticket_status_snapshot
            ))
        })?;
        // tasks legacy malformadas no tumban la lectura de la sesión
        let selected_tasks = self
            .selected_tasks
            .map(|v| serde_json::from_value(v).unwrap_or_default());
        Ok(TimeLog {
            id: self.id,
            ticket_id: self.ticket_id,
            technician_id: self.technician_id,
            started_at: self.started_at,
            ended_at: self.ended_at,
            kind,
            ticket_status_snapshot: snapshot,
            selected_tasks,
            resolutions: self.resolutions,
            notes: self.notes,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PartRow {
    id: Uuid,
    ticket_id: String,
    description: String,
    status: String,
    cost: Decimal,
    created_at: DateTime<Utc>,
}

impl PartRow {
    fn into_model(self) -> AppResult<Part> {
        let status = PartStatus::parse(&self.status)
            .ok_or_else(|| internal_error(&format!("unknown part status '{}'", self.status)))?;
        Ok(Part {
            id: self.id,
            ticket_id: self.ticket_id,
            description: self.description,
            status,
            cost: self.cost,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InspectionRow {
    id: Uuid,
    tenant_id: Uuid,
    location_id: Uuid,
    vehicle_id: Uuid,
    mechanical: serde_json::Value,
    cosmetic: serde_json::Value,
    diagnostic_codes: serde_json::Value,
    needs_mechanical_recon: bool,
    needs_cosmetic_recon: bool,
    priority: String,
    created_at: DateTime<Utc>,
}

impl InspectionRow {
    fn into_model(self) -> Inspection {
        // parse defensivo: blobs legacy malformados → ledger vacío
        Inspection {
            id: self.id,
            tenant_id: self.tenant_id,
            location_id: self.location_id,
            vehicle_id: self.vehicle_id,
            mechanical: checklist_from_value(self.mechanical),
            cosmetic: checklist_from_value(self.cosmetic),
            diagnostic_codes: diagnostic_codes_from_value(self.diagnostic_codes),
            needs_mechanical_recon: self.needs_mechanical_recon,
            needs_cosmetic_recon: self.needs_cosmetic_recon,
            priority: PriorityTier::parse(&self.priority).unwrap_or(PriorityTier::Normal),
            created_at: self.created_at,
        }
    }
}

fn tasks_to_value(tasks: &Option<Vec<String>>) -> Option<serde_json::Value> {
    tasks.as_ref().map(|t| serde_json::json!(t))
}

fn checklist_to_value(map: &crate::models::inspection::ChecklistMap) -> AppResult<serde_json::Value> {
    serde_json::to_value(map).map_err(|e| internal_error(&format!("serializing checklist: {}", e)))
}

/// Traduce una unique violation del INSERT de tickets al error de dominio:
/// el índice parcial de lane → error de validación, la primary key → id
/// duplicado (el caller regenera el id y reintenta)
fn map_ticket_insert_error(e: sqlx::Error, ticket_id: &str) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return if db.constraint() == Some("service_tickets_active_lane_idx") {
                validation_error(
                    "ticket_type",
                    "an active ticket already exists for this vehicle in this lane",
                )
            } else {
                AppError::DuplicateTicketId(ticket_id.to_string())
            };
        }
    }
    AppError::Database(e)
}

// helper: INSERT de un time log dentro de una transacción
async fn insert_time_log(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    log: &TimeLog,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO time_logs (id, ticket_id, technician_id, started_at, ended_at, kind,
                               ticket_status_snapshot, selected_tasks, resolutions, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(log.id)
    .bind(&log.ticket_id)
    .bind(log.technician_id)
    .bind(log.started_at)
    .bind(log.ended_at)
    .bind(log.kind.as_str())
    .bind(log.ticket_status_snapshot.as_str())
    .bind(tasks_to_value(&log.selected_tasks))
    .bind(log.resolutions.clone())
    .bind(&log.notes)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl WorkshopStore for PgStore {
    async fn get_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        let row = sqlx::query_as::<_, VehicleRow>("SELECT * FROM vehicles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(VehicleRow::into_model).transpose()
    }

    async fn get_ticket(&self, id: &str) -> AppResult<Option<ServiceTicket>> {
        let row = sqlx::query_as::<_, TicketRow>(
            "SELECT * FROM service_tickets WHERE id = $1 AND deleted = FALSE",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TicketRow::into_model).transpose()
    }

    async fn ticket_exists(&self, id: &str) -> AppResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM service_tickets WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn get_inspection(&self, id: Uuid) -> AppResult<Option<Inspection>> {
        let row = sqlx::query_as::<_, InspectionRow>("SELECT * FROM inspections WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(InspectionRow::into_model))
    }

    async fn find_active_ticket(
        &self,
        vehicle_id: Uuid,
        ticket_type: TicketType,
    ) -> AppResult<Option<ServiceTicket>> {
        let row = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT * FROM service_tickets
            WHERE vehicle_id = $1 AND ticket_type = $2
              AND deleted = FALSE AND status <> 'Completed'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(vehicle_id)
        .bind(ticket_type.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TicketRow::into_model).transpose()
    }

    async fn find_open_session(&self, technician_id: Uuid) -> AppResult<Option<TimeLog>> {
        let row = sqlx::query_as::<_, TimeLogRow>(
            "SELECT * FROM time_logs WHERE technician_id = $1 AND ended_at IS NULL AND kind = 'work'",
        )
        .bind(technician_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TimeLogRow::into_model).transpose()
    }

    async fn sessions_for_ticket(&self, ticket_id: &str) -> AppResult<Vec<TimeLog>> {
        let rows = sqlx::query_as::<_, TimeLogRow>(
            "SELECT * FROM time_logs WHERE ticket_id = $1 ORDER BY started_at",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TimeLogRow::into_model).collect()
    }

    async fn parts_for_ticket(&self, ticket_id: &str) -> AppResult<Vec<Part>> {
        let rows = sqlx::query_as::<_, PartRow>(
            "SELECT * FROM parts WHERE ticket_id = $1 ORDER BY created_at",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PartRow::into_model).collect()
    }

    async fn insert_vehicle(&self, vehicle: Vehicle) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO vehicles (id, tenant_id, location_id, vin, status, sold, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(vehicle.id)
        .bind(vehicle.tenant_id)
        .bind(vehicle.location_id)
        .bind(&vehicle.vin)
        .bind(vehicle.status.as_str())
        .bind(vehicle.sold)
        .bind(vehicle.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_inspection(&self, inspection: Inspection) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inspections (id, tenant_id, location_id, vehicle_id, mechanical, cosmetic,
                                     diagnostic_codes, needs_mechanical_recon, needs_cosmetic_recon,
                                     priority, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(inspection.id)
        .bind(inspection.tenant_id)
        .bind(inspection.location_id)
        .bind(inspection.vehicle_id)
        .bind(checklist_to_value(&inspection.mechanical)?)
        .bind(checklist_to_value(&inspection.cosmetic)?)
        .bind(serde_json::json!(inspection.diagnostic_codes))
        .bind(inspection.needs_mechanical_recon)
        .bind(inspection.needs_cosmetic_recon)
        .bind(inspection.priority.as_str())
        .bind(inspection.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_ticket(
        &self,
        ticket: ServiceTicket,
        vehicle_status: Option<VehicleStatus>,
    ) -> AppResult<ServiceTicket> {
        let mut tx = self.pool.begin().await?;

        // re-comprobación del invariante de lane dentro de la transacción;
        // la carrera SELECT-vacío vs SELECT-vacío la cierra el índice único
        // parcial (ver doc del módulo)
        let lane_taken: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT id FROM service_tickets
            WHERE vehicle_id = $1 AND ticket_type = $2
              AND deleted = FALSE AND status <> 'Completed'
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(ticket.vehicle_id)
        .bind(ticket.ticket_type.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        if lane_taken.is_some() {
            return Err(validation_error(
                "ticket_type",
                "an active ticket already exists for this vehicle in this lane",
            ));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO service_tickets (id, tenant_id, location_id, vehicle_id, description,
                                         status, assigned_to, process_notes, difficulty,
                                         inspection_id, ticket_type, deleted, deleted_at,
                                         deleted_by, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, FALSE, NULL, NULL, $12, NULL)
            "#,
        )
        .bind(&ticket.id)
        .bind(ticket.tenant_id)
        .bind(ticket.location_id)
        .bind(ticket.vehicle_id)
        .bind(&ticket.description)
        .bind(ticket.status.as_str())
        .bind(ticket.assigned_to)
        .bind(&ticket.process_notes)
        .bind(ticket.difficulty.map(|d| d.as_str()))
        .bind(ticket.inspection_id)
        .bind(ticket.ticket_type.as_str())
        .bind(ticket.created_at)
        .execute(&mut *tx)
        .await;
        if let Err(e) = inserted {
            return Err(map_ticket_insert_error(e, &ticket.id));
        }

        if let Some(new_status) = vehicle_status {
            sqlx::query("UPDATE vehicles SET status = $2 WHERE id = $1")
                .bind(ticket.vehicle_id)
                .bind(new_status.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(ticket)
    }

    async fn clock_in(
        &self,
        log: TimeLog,
        ticket_status: TicketStatus,
        vehicle_status: VehicleStatus,
    ) -> AppResult<TimeLog> {
        let mut tx = self.pool.begin().await?;

        // lock de las sesiones del técnico: de dos clock-ins concurrentes
        // solo uno pasa de aquí con cero filas
        let open: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM time_logs
            WHERE technician_id = $1 AND ended_at IS NULL AND kind = 'work'
            FOR UPDATE
            "#,
        )
        .bind(log.technician_id)
        .fetch_optional(&mut *tx)
        .await?;

        if open.is_some() {
            return Err(AppError::SessionConflict(format!(
                "technician '{}' already has an open session",
                log.technician_id
            )));
        }

        let ticket: Option<TicketRow> = sqlx::query_as(
            r#"
            SELECT * FROM service_tickets
            WHERE id = $1 AND deleted = FALSE AND status <> 'Completed'
            FOR UPDATE
            "#,
        )
        .bind(&log.ticket_id)
        .fetch_optional(&mut *tx)
        .await?;
        let ticket = ticket
            .ok_or_else(|| ticket_not_found(&log.ticket_id))?
            .into_model()?;

        insert_time_log(&mut tx, &log).await?;

        sqlx::query("UPDATE service_tickets SET status = $2 WHERE id = $1")
            .bind(&log.ticket_id)
            .bind(ticket_status.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE vehicles SET status = $2 WHERE id = $1")
            .bind(ticket.vehicle_id)
            .bind(vehicle_status.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(log)
    }

    async fn clock_out(&self, args: ClockOutArgs) -> AppResult<ClockOutRecord> {
        let mut tx = self.pool.begin().await?;

        let session: Option<TimeLogRow> = sqlx::query_as(
            r#"
            SELECT * FROM time_logs
            WHERE technician_id = $1 AND ended_at IS NULL AND kind = 'work'
            FOR UPDATE
            "#,
        )
        .bind(args.technician_id)
        .fetch_optional(&mut *tx)
        .await?;
        let mut session = session
            .ok_or_else(|| {
                AppError::NoActiveSession(format!(
                    "technician '{}' has no open session",
                    args.technician_id
                ))
            })?
            .into_model()?;

        let ticket: Option<TicketRow> = sqlx::query_as(
            "SELECT * FROM service_tickets WHERE id = $1 AND deleted = FALSE FOR UPDATE",
        )
        .bind(&session.ticket_id)
        .fetch_optional(&mut *tx)
        .await?;
        let mut ticket = ticket
            .ok_or_else(|| ticket_not_found(&session.ticket_id))?
            .into_model()?;

        // row lock del ledger: el merge pasa serializado dentro de la tx
        let outcome = if let Some(inspection_id) = ticket.inspection_id {
            let row: Option<InspectionRow> =
                sqlx::query_as("SELECT * FROM inspections WHERE id = $1 FOR UPDATE")
                    .bind(inspection_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let mut inspection = row
                .ok_or_else(|| not_found_error("inspection", &inspection_id.to_string()))?
                .into_model();

            let outcome =
                inspection_ledger::merge(&mut inspection, &args.resolutions, &args.new_issues);

            sqlx::query("UPDATE inspections SET mechanical = $2, cosmetic = $3 WHERE id = $1")
                .bind(inspection_id)
                .bind(checklist_to_value(&inspection.mechanical)?)
                .bind(checklist_to_value(&inspection.cosmetic)?)
                .execute(&mut *tx)
                .await?;

            outcome
        } else {
            MergeOutcome {
                items_fixed: 0,
                remaining_open: 0,
            }
        };

        let payload = serde_json::json!({
            "resolutions": args.resolutions,
            "new_issues": args.new_issues,
            "notes": args.notes,
        });

        sqlx::query("UPDATE time_logs SET ended_at = $2, resolutions = $3, notes = $4 WHERE id = $1")
            .bind(session.id)
            .bind(args.ended_at)
            .bind(&payload)
            .bind(&args.notes)
            .execute(&mut *tx)
            .await?;

        let new_status = ticket
            .status
            .after_clock_out(outcome.items_fixed, outcome.remaining_open);
        sqlx::query("UPDATE service_tickets SET status = $2 WHERE id = $1")
            .bind(&ticket.id)
            .bind(new_status.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        session.ended_at = Some(args.ended_at);
        session.resolutions = Some(payload);
        session.notes = args.notes;
        ticket.status = new_status;

        Ok(ClockOutRecord {
            session,
            ticket,
            outcome,
        })
    }

    async fn request_parts(
        &self,
        part: Part,
        ticket_status: TicketStatus,
        log: TimeLog,
    ) -> AppResult<Part> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE service_tickets SET status = $2 WHERE id = $1 AND deleted = FALSE")
            .bind(&part.ticket_id)
            .bind(ticket_status.as_str())
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(ticket_not_found(&part.ticket_id));
        }

        sqlx::query(
            r#"
            INSERT INTO parts (id, ticket_id, description, status, cost, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(part.id)
        .bind(&part.ticket_id)
        .bind(&part.description)
        .bind(part.status.as_str())
        .bind(part.cost)
        .bind(part.created_at)
        .execute(&mut *tx)
        .await?;

        insert_time_log(&mut tx, &log).await?;

        tx.commit().await?;
        Ok(part)
    }

    async fn confirm_parts(
        &self,
        ticket_id: &str,
        ticket_status: TicketStatus,
        vehicle_status: VehicleStatus,
        log: TimeLog,
    ) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;

        let ticket: Option<TicketRow> = sqlx::query_as(
            "SELECT * FROM service_tickets WHERE id = $1 AND deleted = FALSE FOR UPDATE",
        )
        .bind(ticket_id)
        .fetch_optional(&mut *tx)
        .await?;
        let ticket = ticket
            .ok_or_else(|| ticket_not_found(ticket_id))?
            .into_model()?;

        let received = sqlx::query("UPDATE parts SET status = 'received' WHERE ticket_id = $1 AND status = 'ordered'")
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("UPDATE service_tickets SET status = $2 WHERE id = $1")
            .bind(ticket_id)
            .bind(ticket_status.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE vehicles SET status = $2 WHERE id = $1")
            .bind(ticket.vehicle_id)
            .bind(vehicle_status.as_str())
            .execute(&mut *tx)
            .await?;

        insert_time_log(&mut tx, &log).await?;

        tx.commit().await?;
        Ok(received)
    }

    async fn set_ticket_status(
        &self,
        ticket_id: &str,
        status: TicketStatus,
        vehicle_status: Option<VehicleStatus>,
        completed_at: Option<DateTime<Utc>>,
    ) -> AppResult<ServiceTicket> {
        let mut tx = self.pool.begin().await?;

        let row: Option<TicketRow> = sqlx::query_as(
            r#"
            UPDATE service_tickets
            SET status = $2, completed_at = COALESCE($3, completed_at)
            WHERE id = $1 AND deleted = FALSE
            RETURNING *
            "#,
        )
        .bind(ticket_id)
        .bind(status.as_str())
        .bind(completed_at)
        .fetch_optional(&mut *tx)
        .await?;
        let ticket = row.ok_or_else(|| ticket_not_found(ticket_id))?.into_model()?;

        if let Some(new_status) = vehicle_status {
            sqlx::query("UPDATE vehicles SET status = $2 WHERE id = $1")
                .bind(ticket.vehicle_id)
                .bind(new_status.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(ticket)
    }

    async fn soft_delete_ticket(
        &self,
        ticket_id: &str,
        deleted_by: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE service_tickets
            SET deleted = TRUE, deleted_at = $2, deleted_by = $3
            WHERE id = $1 AND deleted = FALSE
            "#,
        )
        .bind(ticket_id)
        .bind(at)
        .bind(deleted_by)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(ticket_not_found(ticket_id));
        }
        Ok(())
    }
}

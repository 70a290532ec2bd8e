// ==========================================
// 物资集散中心 - 入库日志仓储 (ingresos)
// ==========================================
// 职责: 入库日志写入、待分拣队列查询、清除待分拣标志
// ==========================================

use crate::domain::triage::{IntakeLog, NewIntakeLog, PendingTriageItem};
use crate::domain::types::IntakeType;
use crate::repository::db_utils::{get_enum, get_ts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const INTAKE_COLUMNS: &str = "id, lote_id, tipo, cantidad, descripcion_bulto, peso_estimado, \
                              triaje_pendiente, precio_unitario, fecha_ingreso, registrado_por";

pub struct IntakeRepository {
    conn: Arc<Mutex<Connection>>,
}

impl IntakeRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<IntakeLog> {
        Ok(IntakeLog {
            id: row.get(0)?,
            lot_id: row.get(1)?,
            intake_type: get_enum(row, 2, IntakeType::from_db_str)?,
            quantity: row.get(3)?,
            bulk_description: row.get(4)?,
            estimated_weight: row.get(5)?,
            triage_pending: row.get::<_, i64>(6)? != 0,
            unit_price: row.get(7)?,
            intake_at: get_ts(row, 8)?,
            recorded_by: row.get(9)?,
        })
    }

    /// 写入入库日志
    pub fn insert_with(conn: &Connection, log: &NewIntakeLog) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO ingresos (
                lote_id, tipo, cantidad, descripcion_bulto, peso_estimado,
                triaje_pendiente, precio_unitario, registrado_por
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                log.lot_id,
                log.intake_type.to_db_str(),
                log.quantity,
                log.bulk_description,
                log.estimated_weight,
                log.triage_pending as i64,
                log.unit_price,
                log.recorded_by,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 清除某批次的待分拣标志，返回受影响行数
    pub fn clear_pending_for_lot_with(conn: &Connection, lot_id: i64) -> RepositoryResult<usize> {
        let rows = conn.execute(
            "UPDATE ingresos SET triaje_pendiente = 0 WHERE lote_id = ?1 AND triaje_pendiente = 1",
            params![lot_id],
        )?;
        Ok(rows)
    }

    /// 某批次的入库日志
    pub fn list_by_lot(&self, lot_id: i64) -> RepositoryResult<Vec<IntakeLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM ingresos WHERE lote_id = ?1 ORDER BY id",
            INTAKE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![lot_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 最近的入库日志
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<IntakeLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM ingresos ORDER BY fecha_ingreso DESC, id DESC LIMIT ?1",
            INTAKE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![limit as i64], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 待分拣队列（最早入库在前）
    pub fn list_pending_triage(&self) -> RepositoryResult<Vec<PendingTriageItem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT ingreso_id, lote_id, lote_codigo, cantidad_actual,
                   descripcion_bulto, peso_estimado, fecha_ingreso, registrado_por
              FROM v_triaje_pendiente
             ORDER BY fecha_ingreso ASC, ingreso_id ASC
            "#,
        )?;
        let items = stmt
            .query_map([], |row| {
                Ok(PendingTriageItem {
                    intake_id: row.get(0)?,
                    lot_id: row.get(1)?,
                    lot_code: row.get(2)?,
                    current_quantity: row.get(3)?,
                    bulk_description: row.get(4)?,
                    estimated_weight: row.get(5)?,
                    intake_at: get_ts(row, 6)?,
                    recorded_by: row.get(7)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(items)
    }
}

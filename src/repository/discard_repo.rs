// ==========================================
// 物资集散中心 - 报废记录仓储 (descartes)
// ==========================================
// 报废记录只由分拣流程写入
// ==========================================

use crate::domain::triage::{DiscardItem, DiscardRecord};
use crate::repository::db_utils::get_ts;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct DiscardRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DiscardRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入一条报废记录
    pub fn insert_with(
        conn: &Connection,
        item: &DiscardItem,
        source_lot_id: Option<i64>,
        recorded_by: &str,
    ) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO descartes (
                producto_id, descripcion, cantidad, motivo_descarte, lote_origen_id, registrado_por
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                item.product_id,
                item.description.trim(),
                item.quantity,
                item.discard_reason.trim(),
                source_lot_id,
                recorded_by,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 某源批次产生的报废记录
    pub fn list_by_source_lot(&self, lot_id: i64) -> RepositoryResult<Vec<DiscardRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, producto_id, descripcion, cantidad, motivo_descarte,
                   lote_origen_id, fecha_descarte, registrado_por
              FROM descartes
             WHERE lote_origen_id = ?1
             ORDER BY id
            "#,
        )?;
        let records = stmt
            .query_map(params![lot_id], |row| {
                Ok(DiscardRecord {
                    id: row.get(0)?,
                    product_id: row.get(1)?,
                    description: row.get(2)?,
                    quantity: row.get(3)?,
                    discard_reason: row.get(4)?,
                    source_lot_id: row.get(5)?,
                    discarded_at: get_ts(row, 6)?,
                    recorded_by: row.get(7)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(records)
    }
}

// ==========================================
// 物资集散中心 - 出库仓储
// ==========================================
// 表: despachos / egresos / mermas
// 写入函数均接受 &Connection，由出库定稿流程在同一事务内调用
// 并发控制: despachos.revision 乐观锁
// ==========================================

use crate::domain::dispatch::{
    dispatch_code, Dispatch, DispatchDetail, DispatchLine, DispatchLineView, NewDispatch,
    ShortageRecord,
};
use crate::domain::types::{DispatchReason, DispatchState, TransportType};
use crate::repository::db_utils::{fmt_ts, get_enum, get_opt_date, get_opt_ts, get_ts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const DISPATCH_COLUMNS: &str = "id, codigo, beneficiario_id, motivo, motivo_detalle, fecha_despacho, \
                                estado, tipo_transporte, costo_transporte, fue_rectificado, rectificacion_notas, \
                                preparado_por, validado_por, fecha_validacion, fecha_entrega, evidencia_url, revision";

// ==========================================
// DispatchRepository - 出库仓储
// ==========================================
pub struct DispatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DispatchRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<Dispatch> {
        Ok(Dispatch {
            id: row.get(0)?,
            code: row.get(1)?,
            beneficiary_id: row.get(2)?,
            reason: get_enum(row, 3, DispatchReason::from_db_str)?,
            reason_detail: row.get(4)?,
            dispatch_date: get_ts(row, 5)?,
            state: get_enum(row, 6, DispatchState::from_db_str)?,
            transport_type: get_enum(row, 7, TransportType::from_db_str)?,
            transport_cost: row.get(8)?,
            was_rectified: row.get::<_, i64>(9)? != 0,
            rectification_notes: row.get(10)?,
            prepared_by: row.get(11)?,
            validated_by: row.get(12)?,
            validated_at: get_opt_ts(row, 13)?,
            delivered_at: get_opt_ts(row, 14)?,
            evidence_url: row.get(15)?,
            revision: row.get(16)?,
        })
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 计算当日下一个出库单编码
    pub fn next_code_with(conn: &Connection, date: NaiveDate) -> RepositoryResult<String> {
        let prefix = format!("DES-{}-%", date.format("%Y%m%d"));
        let max_seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(CAST(substr(codigo, 14) AS INTEGER)), 0) FROM despachos WHERE codigo LIKE ?1",
            params![prefix],
            |row| row.get(0),
        )?;
        Ok(dispatch_code(date, max_seq + 1))
    }

    /// 写入出库单头
    pub fn insert_header_with(conn: &Connection, dispatch: &NewDispatch) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO despachos (
                codigo, beneficiario_id, motivo, motivo_detalle, fecha_despacho, estado,
                tipo_transporte, costo_transporte, preparado_por
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                dispatch.code,
                dispatch.beneficiary_id,
                dispatch.reason.to_db_str(),
                dispatch.reason_detail,
                fmt_ts(dispatch.dispatch_date),
                dispatch.state.to_db_str(),
                dispatch.transport_type.to_db_str(),
                dispatch.transport_cost,
                dispatch.prepared_by,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 写入出库行
    pub fn insert_line_with(
        conn: &Connection,
        dispatch_id: i64,
        lot_id: Option<i64>,
        product_id: i64,
        requested_quantity: i64,
        dispatched_quantity: Option<i64>,
    ) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO egresos (
                despacho_id, lote_id, producto_id, cantidad_solicitada, cantidad_despachada
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                dispatch_id,
                lot_id,
                product_id,
                requested_quantity,
                dispatched_quantity
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 写入损耗记录
    pub fn insert_shortage_with(
        conn: &Connection,
        dispatch_id: i64,
        lot_id: i64,
        shortfall_quantity: i64,
        reason: &str,
        recorded_by: &str,
    ) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO mermas (despacho_id, lote_id, cantidad_faltante, motivo, registrado_por)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![dispatch_id, lot_id, shortfall_quantity, reason, recorded_by],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 更新出库单状态相关字段（带乐观锁检查）
    ///
    /// # 错误
    /// - `OptimisticLockFailure`: revision 不匹配
    /// - `NotFound`: 出库单不存在
    pub fn update_with(conn: &Connection, dispatch: &Dispatch) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE despachos
               SET estado = ?1, fue_rectificado = ?2, rectificacion_notas = ?3,
                   validado_por = ?4, fecha_validacion = ?5, fecha_entrega = ?6,
                   evidencia_url = ?7, revision = revision + 1
             WHERE id = ?8 AND revision = ?9
            "#,
            params![
                dispatch.state.to_db_str(),
                dispatch.was_rectified as i64,
                dispatch.rectification_notes,
                dispatch.validated_by,
                dispatch.validated_at.map(fmt_ts),
                dispatch.delivered_at.map(fmt_ts),
                dispatch.evidence_url,
                dispatch.id,
                dispatch.revision,
            ],
        )?;

        if rows == 0 {
            // 判断是记录不存在还是 revision 冲突
            let actual: Option<i64> = conn
                .query_row(
                    "SELECT revision FROM despachos WHERE id = ?1",
                    params![dispatch.id],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(match actual {
                Some(actual) => RepositoryError::OptimisticLockFailure {
                    entity: "Dispatch".to_string(),
                    id: dispatch.id.to_string(),
                    expected: dispatch.revision,
                    actual,
                },
                None => RepositoryError::not_found("Dispatch", dispatch.id),
            });
        }
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Dispatch>> {
        let conn = self.get_conn()?;
        Self::find_by_id_with(&conn, id)
    }

    pub fn find_by_id_with(conn: &Connection, id: i64) -> RepositoryResult<Option<Dispatch>> {
        let sql = format!("SELECT {} FROM despachos WHERE id = ?1", DISPATCH_COLUMNS);
        Ok(conn.query_row(&sql, params![id], Self::map_row).optional()?)
    }

    pub fn find_by_code(&self, code: &str) -> RepositoryResult<Option<Dispatch>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM despachos WHERE codigo = ?1", DISPATCH_COLUMNS);
        Ok(conn.query_row(&sql, params![code], Self::map_row).optional()?)
    }

    /// 出库单列表（最新在前）
    pub fn list(&self, limit: usize) -> RepositoryResult<Vec<Dispatch>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM despachos ORDER BY fecha_despacho DESC, id DESC LIMIT ?1",
            DISPATCH_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit as i64], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 出库行（按写入顺序）
    pub fn lines_for_with(conn: &Connection, dispatch_id: i64) -> RepositoryResult<Vec<DispatchLine>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, despacho_id, lote_id, producto_id, cantidad_solicitada,
                   cantidad_despachada, created_at
              FROM egresos
             WHERE despacho_id = ?1
             ORDER BY id
            "#,
        )?;
        let lines = stmt
            .query_map(params![dispatch_id], |row| {
                Ok(DispatchLine {
                    id: row.get(0)?,
                    dispatch_id: row.get(1)?,
                    lot_id: row.get(2)?,
                    product_id: row.get(3)?,
                    requested_quantity: row.get(4)?,
                    dispatched_quantity: row.get(5)?,
                    created_at: get_ts(row, 6)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(lines)
    }

    pub fn lines_for(&self, dispatch_id: i64) -> RepositoryResult<Vec<DispatchLine>> {
        let conn = self.get_conn()?;
        Self::lines_for_with(&conn, dispatch_id)
    }

    /// 损耗记录
    pub fn shortages_for_with(
        conn: &Connection,
        dispatch_id: i64,
    ) -> RepositoryResult<Vec<ShortageRecord>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, despacho_id, lote_id, cantidad_faltante, motivo, fecha_registro, registrado_por
              FROM mermas
             WHERE despacho_id = ?1
             ORDER BY id
            "#,
        )?;
        let records = stmt
            .query_map(params![dispatch_id], |row| {
                Ok(ShortageRecord {
                    id: row.get(0)?,
                    dispatch_id: row.get(1)?,
                    lot_id: row.get(2)?,
                    shortfall_quantity: row.get(3)?,
                    reason: row.get(4)?,
                    recorded_at: get_ts(row, 5)?,
                    recorded_by: row.get(6)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(records)
    }

    pub fn shortages_for(&self, dispatch_id: i64) -> RepositoryResult<Vec<ShortageRecord>> {
        let conn = self.get_conn()?;
        Self::shortages_for_with(&conn, dispatch_id)
    }

    /// 出库单详情（明细行含产品名与批次编码）
    pub fn detail(&self, dispatch_id: i64) -> RepositoryResult<Option<DispatchDetail>> {
        let conn = self.get_conn()?;
        let dispatch = match Self::find_by_id_with(&conn, dispatch_id)? {
            Some(d) => d,
            None => return Ok(None),
        };

        let beneficiary_name: String = conn.query_row(
            "SELECT nombre FROM beneficiarios WHERE id = ?1",
            params![dispatch.beneficiary_id],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            r#"
            SELECT e.id, e.producto_id, p.nombre, e.lote_id, l.codigo, l.fecha_caducidad,
                   e.cantidad_solicitada, e.cantidad_despachada
              FROM egresos e
              JOIN productos p ON p.id = e.producto_id
              LEFT JOIN lotes l ON l.id = e.lote_id
             WHERE e.despacho_id = ?1
             ORDER BY e.id
            "#,
        )?;
        let lines = stmt
            .query_map(params![dispatch_id], |row| {
                Ok(DispatchLineView {
                    line_id: row.get(0)?,
                    product_id: row.get(1)?,
                    product_name: row.get(2)?,
                    lot_id: row.get(3)?,
                    lot_code: row.get(4)?,
                    expiry_date: get_opt_date(row, 5)?,
                    requested_quantity: row.get(6)?,
                    dispatched_quantity: row.get(7)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let shortages = Self::shortages_for_with(&conn, dispatch_id)?;

        Ok(Some(DispatchDetail {
            dispatch,
            beneficiary_name,
            lines,
            shortages,
        }))
    }
}

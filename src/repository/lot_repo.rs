// ==========================================
// 物资集散中心 - 库存批次仓储
// ==========================================
// 职责: lotes 表读写、FEFO 候选查询、带版本校验的原子扣减
// 并发控制: revision 乐观锁 + cantidad_actual >= n 条件更新
// 红线: 数量不得为负；扣减归零即 agotado
// ==========================================

use crate::domain::dispatch::lot_code;
use crate::domain::lot::{FefoLotView, Lot, NewLot, StockSummary};
use crate::domain::types::LotState;
use crate::repository::db_utils::{fmt_date, get_date, get_enum, get_opt_date, get_ts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const LOT_COLUMNS: &str = "id, codigo, producto_id, donante_id, fecha_ingreso, fecha_caducidad, \
                           cantidad_inicial, cantidad_actual, estado, notas, revision, created_at, created_by";

// ==========================================
// LotRepository - 批次仓储
// ==========================================
pub struct LotRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LotRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<Lot> {
        Ok(Lot {
            id: row.get(0)?,
            code: row.get(1)?,
            product_id: row.get(2)?,
            donor_id: row.get(3)?,
            intake_date: get_date(row, 4)?,
            expiry_date: get_opt_date(row, 5)?,
            initial_quantity: row.get(6)?,
            current_quantity: row.get(7)?,
            state: get_enum(row, 8, LotState::from_db_str)?,
            notes: row.get(9)?,
            revision: row.get(10)?,
            created_at: get_ts(row, 11)?,
            created_by: row.get(12)?,
        })
    }

    // ==========================================
    // 写入操作（_with 版本可在事务内调用）
    // ==========================================

    /// 计算当日下一个批次编码
    fn next_code_with(conn: &Connection, date: NaiveDate) -> RepositoryResult<String> {
        let prefix = format!("LT-{}-%", date.format("%Y%m%d"));
        let max_seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(CAST(substr(codigo, 13) AS INTEGER)), 0) FROM lotes WHERE codigo LIKE ?1",
            params![prefix],
            |row| row.get(0),
        )?;
        Ok(lot_code(date, max_seq + 1))
    }

    /// 新建批次（initial = current = quantity）
    pub fn insert_with(conn: &Connection, lot: &NewLot) -> RepositoryResult<Lot> {
        if lot.quantity < 0 {
            return Err(RepositoryError::FieldValueError {
                field: "cantidad".to_string(),
                message: format!("批次数量不能为负: {}", lot.quantity),
            });
        }

        let code = Self::next_code_with(conn, chrono::Local::now().date_naive())?;
        conn.execute(
            r#"
            INSERT INTO lotes (
                codigo, producto_id, donante_id, fecha_ingreso, fecha_caducidad,
                cantidad_inicial, cantidad_actual, estado, notas, revision, created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7, ?8, 0, ?9)
            "#,
            params![
                code,
                lot.product_id,
                lot.donor_id,
                fmt_date(lot.intake_date),
                lot.expiry_date.map(fmt_date),
                lot.quantity,
                lot.state.to_db_str(),
                lot.notes,
                lot.created_by,
            ],
        )?;
        let id = conn.last_insert_rowid();
        Self::find_by_id_with(conn, id)?.ok_or_else(|| RepositoryError::not_found("Lot", id))
    }

    /// 原子扣减
    ///
    /// 单条 UPDATE 同时校验 revision 与剩余数量，归零时置为 agotado。
    ///
    /// # 错误
    /// - `NotFound`: 批次不存在
    /// - `OptimisticLockFailure`: revision 不匹配（批次被并发修改）
    /// - `InsufficientStock`: 剩余数量不足或批次不可分配
    pub fn decrement_with(
        conn: &Connection,
        lot_id: i64,
        amount: i64,
        expected_revision: i64,
    ) -> RepositoryResult<Lot> {
        if amount < 0 {
            return Err(RepositoryError::FieldValueError {
                field: "cantidad".to_string(),
                message: format!("扣减数量不能为负: {}", amount),
            });
        }

        let rows = conn.execute(
            r#"
            UPDATE lotes
               SET cantidad_actual = cantidad_actual - ?1,
                   estado = CASE WHEN cantidad_actual - ?1 = 0 THEN 'agotado' ELSE estado END,
                   revision = revision + 1
             WHERE id = ?2
               AND revision = ?3
               AND estado = 'disponible'
               AND cantidad_actual >= ?1
            "#,
            params![amount, lot_id, expected_revision],
        )?;

        if rows == 0 {
            // 判断是批次不存在、版本冲突还是库存不足
            let current = Self::find_by_id_with(conn, lot_id)?
                .ok_or_else(|| RepositoryError::not_found("Lot", lot_id))?;
            if current.revision != expected_revision {
                return Err(RepositoryError::OptimisticLockFailure {
                    entity: "Lot".to_string(),
                    id: lot_id.to_string(),
                    expected: expected_revision,
                    actual: current.revision,
                });
            }
            return Err(RepositoryError::InsufficientStock {
                lot_id,
                available: if current.state == LotState::Available {
                    current.current_quantity
                } else {
                    0
                },
                requested: amount,
            });
        }

        Self::find_by_id_with(conn, lot_id)?.ok_or_else(|| RepositoryError::not_found("Lot", lot_id))
    }

    /// 直接设置数量与状态（分拣源批次），带版本校验
    pub fn set_quantity_and_state_with(
        conn: &Connection,
        lot_id: i64,
        quantity: i64,
        state: LotState,
        expected_revision: i64,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE lotes
               SET cantidad_actual = ?1, estado = ?2, revision = revision + 1
             WHERE id = ?3 AND revision = ?4
            "#,
            params![quantity, state.to_db_str(), lot_id, expected_revision],
        )?;
        if rows == 0 {
            return Err(Self::conflict_or_missing(conn, lot_id, expected_revision)?);
        }
        Ok(())
    }

    /// 人工报废（descartado 为批次终态）
    pub fn mark_discarded_with(
        conn: &Connection,
        lot_id: i64,
        expected_revision: i64,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE lotes
               SET estado = 'descartado', revision = revision + 1
             WHERE id = ?1 AND revision = ?2 AND estado IN ('disponible', 'triaje_pendiente')
            "#,
            params![lot_id, expected_revision],
        )?;
        if rows == 0 {
            let current = Self::find_by_id_with(conn, lot_id)?
                .ok_or_else(|| RepositoryError::not_found("Lot", lot_id))?;
            if current.revision != expected_revision {
                return Err(Self::conflict_or_missing(conn, lot_id, expected_revision)?);
            }
            return Err(RepositoryError::InvalidStateTransition {
                from: current.state.to_db_str().to_string(),
                to: LotState::Discarded.to_db_str().to_string(),
            });
        }
        Ok(())
    }

    fn conflict_or_missing(
        conn: &Connection,
        lot_id: i64,
        expected_revision: i64,
    ) -> RepositoryResult<RepositoryError> {
        let actual: Option<i64> = conn
            .query_row(
                "SELECT revision FROM lotes WHERE id = ?1",
                params![lot_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(match actual {
            Some(actual) => RepositoryError::OptimisticLockFailure {
                entity: "Lot".to_string(),
                id: lot_id.to_string(),
                expected: expected_revision,
                actual,
            },
            None => RepositoryError::not_found("Lot", lot_id),
        })
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, lot_id: i64) -> RepositoryResult<Option<Lot>> {
        let conn = self.get_conn()?;
        Self::find_by_id_with(&conn, lot_id)
    }

    pub fn find_by_id_with(conn: &Connection, lot_id: i64) -> RepositoryResult<Option<Lot>> {
        let sql = format!("SELECT {} FROM lotes WHERE id = ?1", LOT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![lot_id], Self::map_row)
            .optional()?)
    }

    /// FEFO 候选批次
    ///
    /// 条件: 同产品、disponible、cantidad_actual > 0
    /// 排序: 过期日升序，无过期日排最后，同日按 id
    pub fn find_fefo_candidates_with(
        conn: &Connection,
        product_id: i64,
    ) -> RepositoryResult<Vec<Lot>> {
        let sql = format!(
            r#"
            SELECT {} FROM lotes
             WHERE producto_id = ?1 AND estado = 'disponible' AND cantidad_actual > 0
             ORDER BY fecha_caducidad IS NULL, fecha_caducidad ASC, id ASC
            "#,
            LOT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let lots = stmt
            .query_map(params![product_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(lots)
    }

    pub fn find_fefo_candidates(&self, product_id: i64) -> RepositoryResult<Vec<Lot>> {
        let conn = self.get_conn()?;
        Self::find_fefo_candidates_with(&conn, product_id)
    }

    /// 某产品的全部批次（最新在前）
    pub fn list_by_product(&self, product_id: i64) -> RepositoryResult<Vec<Lot>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM lotes WHERE producto_id = ?1 ORDER BY created_at DESC, id DESC",
            LOT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let lots = stmt
            .query_map(params![product_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(lots)
    }

    /// 按状态列出批次
    pub fn list_by_state(&self, state: LotState) -> RepositoryResult<Vec<Lot>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM lotes WHERE estado = ?1 ORDER BY id",
            LOT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let lots = stmt
            .query_map(params![state.to_db_str()], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(lots)
    }

    // ==========================================
    // 库存视图
    // ==========================================

    fn map_stock(row: &Row<'_>) -> SqliteResult<StockSummary> {
        Ok(StockSummary {
            product_id: row.get(0)?,
            product_name: row.get(1)?,
            category: row.get(2)?,
            climate: row.get(3)?,
            unit_of_measure: row.get(4)?,
            total_stock: row.get(5)?,
            next_expiry: get_opt_date(row, 6)?,
            lot_count: row.get(7)?,
        })
    }

    /// 各产品当前库存汇总
    pub fn stock_summary(&self) -> RepositoryResult<Vec<StockSummary>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT producto_id, producto, categoria, clima, unidad_medida,
                   stock_total, proxima_caducidad, num_lotes
              FROM v_stock_actual
             ORDER BY producto COLLATE NOCASE, producto_id
            "#,
        )?;
        let rows = stmt
            .query_map([], Self::map_stock)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 单个产品的库存汇总（停用产品返回 None）
    pub fn stock_for_product(&self, product_id: i64) -> RepositoryResult<Option<StockSummary>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT producto_id, producto, categoria, clima, unidad_medida,
                       stock_total, proxima_caducidad, num_lotes
                  FROM v_stock_actual
                 WHERE producto_id = ?1
                "#,
                params![product_id],
                Self::map_stock,
            )
            .optional()?;
        Ok(row)
    }

    /// FEFO 批次列表（含剩余天数），可按产品过滤
    pub fn fefo_view(&self, product_id: Option<i64>) -> RepositoryResult<Vec<FefoLotView>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, codigo, producto_id, producto, cantidad_actual, fecha_caducidad, dias_para_vencer
              FROM v_lotes_fefo
             WHERE (?1 IS NULL OR producto_id = ?1)
             ORDER BY fecha_caducidad ASC, id ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![product_id], |row| {
                Ok(FefoLotView {
                    lot_id: row.get(0)?,
                    code: row.get(1)?,
                    product_id: row.get(2)?,
                    product_name: row.get(3)?,
                    current_quantity: row.get(4)?,
                    expiry_date: get_date(row, 5)?,
                    days_to_expiry: row.get(6)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }
}

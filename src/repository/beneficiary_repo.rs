// ==========================================
// 物资集散中心 - 受益方仓储
// ==========================================

use crate::domain::beneficiary::{Beneficiary, NewBeneficiary};
use crate::repository::db_utils::{contains_pattern, get_ts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const BENEFICIARY_COLUMNS: &str = "id, nombre, sector, provincia, canton, parroquia, \
                                   contacto_nombre, contacto_telefono, poblacion_estimada, notas, created_at";

pub struct BeneficiaryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BeneficiaryRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<Beneficiary> {
        Ok(Beneficiary {
            id: row.get(0)?,
            name: row.get(1)?,
            sector: row.get(2)?,
            province: row.get(3)?,
            canton: row.get(4)?,
            parish: row.get(5)?,
            contact_name: row.get(6)?,
            contact_phone: row.get(7)?,
            estimated_population: row.get(8)?,
            notes: row.get(9)?,
            created_at: get_ts(row, 10)?,
        })
    }

    /// 快速新建受益方
    pub fn create(&self, beneficiary: &NewBeneficiary) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO beneficiarios (
                nombre, sector, provincia, canton, parroquia,
                contacto_nombre, contacto_telefono, poblacion_estimada, notas
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                beneficiary.name.trim(),
                beneficiary.sector,
                beneficiary.province,
                beneficiary.canton,
                beneficiary.parish,
                beneficiary.contact_name,
                beneficiary.contact_phone,
                beneficiary.estimated_population,
                beneficiary.notes,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 按 id 查询
    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Beneficiary>> {
        let conn = self.get_conn()?;
        Self::find_by_id_with(&conn, id)
    }

    pub fn find_by_id_with(conn: &Connection, id: i64) -> RepositoryResult<Option<Beneficiary>> {
        let sql = format!(
            "SELECT {} FROM beneficiarios WHERE id = ?1",
            BENEFICIARY_COLUMNS
        );
        Ok(conn.query_row(&sql, params![id], Self::map_row).optional()?)
    }

    /// 列出全部受益方（按名称）
    pub fn list(&self) -> RepositoryResult<Vec<Beneficiary>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM beneficiarios ORDER BY nombre COLLATE NOCASE, id",
            BENEFICIARY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 按名称子串搜索
    pub fn search(&self, query: &str) -> RepositoryResult<Vec<Beneficiary>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM beneficiarios
             WHERE fold(nombre) LIKE fold(?1) ESCAPE '\'
             ORDER BY fold(nombre), id
            "#,
            BENEFICIARY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![contains_pattern(query)], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }
}

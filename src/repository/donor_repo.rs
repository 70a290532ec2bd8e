// ==========================================
// 物资集散中心 - 捐赠人仓储
// ==========================================
// 捐赠人只追加；重名属于外观问题，不做唯一约束
// ==========================================

use crate::domain::product::{Donor, NewDonor};
use crate::domain::types::DonorType;
use crate::repository::db_utils::{contains_pattern, get_enum, get_ts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

/// 搜索结果上限
pub const DONOR_SEARCH_LIMIT: usize = 10;

const DONOR_COLUMNS: &str =
    "id, nombre, tipo, es_anonimo, telefono, email, direccion, notas, created_at, created_by";

pub struct DonorRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DonorRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<Donor> {
        Ok(Donor {
            id: row.get(0)?,
            name: row.get(1)?,
            donor_type: get_enum(row, 2, DonorType::from_db_str)?,
            is_anonymous: row.get::<_, i64>(3)? != 0,
            phone: row.get(4)?,
            email: row.get(5)?,
            address: row.get(6)?,
            notes: row.get(7)?,
            created_at: get_ts(row, 8)?,
            created_by: row.get(9)?,
        })
    }

    /// 新建捐赠人
    pub fn create(&self, donor: &NewDonor, created_by: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::create_with(&conn, donor, created_by)
    }

    pub fn create_with(
        conn: &Connection,
        donor: &NewDonor,
        created_by: &str,
    ) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO donantes (
                nombre, tipo, es_anonimo, telefono, email, direccion, notas, created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                donor.name.trim(),
                donor.donor_type.to_db_str(),
                donor.is_anonymous as i64,
                donor.phone,
                donor.email,
                donor.address,
                donor.notes,
                created_by,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 按 id 查询
    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Donor>> {
        let conn = self.get_conn()?;
        Self::find_by_id_with(&conn, id)
    }

    pub fn find_by_id_with(conn: &Connection, id: i64) -> RepositoryResult<Option<Donor>> {
        let sql = format!("SELECT {} FROM donantes WHERE id = ?1", DONOR_COLUMNS);
        Ok(conn.query_row(&sql, params![id], Self::map_row).optional()?)
    }

    /// 按名称查找（不区分大小写，取最早一条）
    pub fn find_by_name_ci_with(conn: &Connection, name: &str) -> RepositoryResult<Option<Donor>> {
        let sql = format!(
            "SELECT {} FROM donantes WHERE fold(nombre) = fold(?1) ORDER BY id LIMIT 1",
            DONOR_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![name.trim()], Self::map_row)
            .optional()?)
    }

    pub fn find_or_create(&self, donor: &NewDonor, created_by: &str) -> RepositoryResult<(i64, bool)> {
        let conn = self.get_conn()?;
        Self::find_or_create_with(&conn, donor, created_by)
    }

    /// 按名称查找或创建，返回 (id, 是否新建)
    pub fn find_or_create_with(
        conn: &Connection,
        donor: &NewDonor,
        created_by: &str,
    ) -> RepositoryResult<(i64, bool)> {
        if let Some(existing) = Self::find_by_name_ci_with(conn, &donor.name)? {
            return Ok((existing.id, false));
        }
        let id = Self::create_with(conn, donor, created_by)?;
        Ok((id, true))
    }

    /// 按名称子串搜索（空查询返回空集）
    pub fn search(&self, query: &str) -> RepositoryResult<Vec<Donor>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM donantes
             WHERE fold(nombre) LIKE fold(?1) ESCAPE '\'
             ORDER BY fold(nombre), id
             LIMIT ?2
            "#,
            DONOR_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let donors = stmt
            .query_map(
                params![contains_pattern(query), DONOR_SEARCH_LIMIT as i64],
                Self::map_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(donors)
    }

    /// 列出全部捐赠人
    pub fn list(&self) -> RepositoryResult<Vec<Donor>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM donantes ORDER BY nombre COLLATE NOCASE, id",
            DONOR_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let donors = stmt
            .query_map([], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(donors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::initialize_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    #[test]
    fn test_find_or_create_reuses_existing_name() {
        let shared = setup();
        let conn = shared.lock().unwrap();

        let (first, created) = DonorRepository::find_or_create_with(
            &conn,
            &NewDonor::new("Cruz Roja", DonorType::Organization),
            "u1",
        )
        .unwrap();
        assert!(created);

        let (second, created) = DonorRepository::find_or_create_with(
            &conn,
            &NewDonor::new("cruz roja", DonorType::Organization),
            "u1",
        )
        .unwrap();
        assert!(!created);
        assert_eq!(first, second);
    }

    #[test]
    fn test_search_limit_and_order() {
        let shared = setup();
        let repo = DonorRepository::from_connection(shared);
        for i in 0..12 {
            repo.create(&NewDonor::new(format!("Familia {:02}", i), DonorType::Individual), "u1")
                .unwrap();
        }
        let found = repo.search("familia").unwrap();
        assert_eq!(found.len(), DONOR_SEARCH_LIMIT);
        assert_eq!(found[0].name, "Familia 00");
        assert!(repo.search("").unwrap().is_empty());
    }
}

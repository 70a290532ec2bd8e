// ==========================================
// 物资集散中心 - 用户档案仓储
// ==========================================
// 表: auth_identities（身份）/ perfiles（档案，由触发器创建）
// ==========================================

use crate::domain::types::UserRole;
use crate::domain::user::UserProfile;
use crate::repository::db_utils::{build_in_clause, fmt_ts, get_enum, get_opt_ts, get_ts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const PROFILE_COLUMNS: &str =
    "id, nombre, email, rol, activo, activo_hasta, created_at, updated_at";

/// 身份行写入参数
#[derive(Debug, Clone)]
pub struct NewIdentity<'a> {
    pub id: &'a str,
    pub email: &'a str,
    /// Argon2 PHC 字符串（含算法参数与盐）
    pub password_hash: &'a str,
    pub name: &'a str,
    pub role: UserRole,
}

pub struct UserRepository {
    conn: Arc<Mutex<Connection>>,
}

impl UserRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<UserProfile> {
        Ok(UserProfile {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            role: get_enum(row, 3, UserRole::from_db_str)?,
            active: row.get::<_, i64>(4)? != 0,
            active_until: get_opt_ts(row, 5)?,
            created_at: get_ts(row, 6)?,
            updated_at: get_ts(row, 7)?,
        })
    }

    // ==========================================
    // 身份写入（开通函数专用）
    // ==========================================

    /// 写入身份行；perfiles 行由触发器生成
    pub fn insert_identity_with(conn: &Connection, identity: &NewIdentity<'_>) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO auth_identities (
                id, email, password_hash, meta_nombre, meta_rol
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                identity.id,
                identity.email.trim(),
                identity.password_hash,
                identity.name.trim(),
                identity.role.to_db_str(),
            ],
        )?;
        Ok(())
    }

    /// 回填档案的失效时间
    pub fn set_active_until_with(
        conn: &Connection,
        user_id: &str,
        active_until: Option<NaiveDateTime>,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE perfiles SET activo_hasta = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![active_until.map(fmt_ts), user_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("UserProfile", user_id));
        }
        Ok(())
    }

    /// 邮箱是否已注册（不区分大小写）
    pub fn email_exists_with(conn: &Connection, email: &str) -> RepositoryResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM auth_identities WHERE email = ?1 COLLATE NOCASE LIMIT 1",
                params![email.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// 读取登录凭据 (id, PHC 哈希)
    pub fn find_credentials_with(
        conn: &Connection,
        email: &str,
    ) -> RepositoryResult<Option<(String, String)>> {
        Ok(conn
            .query_row(
                "SELECT id, password_hash FROM auth_identities WHERE email = ?1 COLLATE NOCASE",
                params![email.trim()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?)
    }

    // ==========================================
    // 档案读写
    // ==========================================

    pub fn find_by_id(&self, user_id: &str) -> RepositoryResult<Option<UserProfile>> {
        let conn = self.get_conn()?;
        Self::find_by_id_with(&conn, user_id)
    }

    pub fn find_by_id_with(conn: &Connection, user_id: &str) -> RepositoryResult<Option<UserProfile>> {
        let sql = format!("SELECT {} FROM perfiles WHERE id = ?1", PROFILE_COLUMNS);
        Ok(conn
            .query_row(&sql, params![user_id], Self::map_row)
            .optional()?)
    }

    pub fn find_by_email(&self, email: &str) -> RepositoryResult<Option<UserProfile>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM perfiles WHERE email = ?1 COLLATE NOCASE",
            PROFILE_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![email.trim()], Self::map_row)
            .optional()?)
    }

    /// 列出全部档案（最新在前）
    pub fn list(&self) -> RepositoryResult<Vec<UserProfile>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM perfiles ORDER BY created_at DESC, nombre COLLATE NOCASE",
            PROFILE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let profiles = stmt
            .query_map([], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(profiles)
    }

    /// 设置启用标志
    pub fn set_active(&self, user_id: &str, active: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE perfiles SET activo = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![active as i64, user_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("UserProfile", user_id));
        }
        Ok(())
    }

    /// 批量停用，返回实际停用的数量
    pub fn deactivate_many(&self, user_ids: &[String]) -> RepositoryResult<usize> {
        if user_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.get_conn()?;
        let sql = format!(
            "UPDATE perfiles SET activo = 0, updated_at = datetime('now') WHERE activo = 1 AND {}",
            build_in_clause("id", user_ids)
        );
        let rows = conn.execute(&sql, params_from_iter(user_ids.iter()))?;
        Ok(rows)
    }
}

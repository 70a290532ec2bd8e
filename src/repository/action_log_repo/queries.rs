use super::core::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::repository::db_utils::{get_enum, get_ts};
use crate::repository::error::RepositoryResult;
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

const LOG_COLUMNS: &str =
    "action_id, action_type, action_ts, actor, entity_type, entity_id, payload_json, detail";

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 action_id 查询单个日志
    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM action_log WHERE action_id = ?", LOG_COLUMNS);
        Ok(conn
            .query_row(&sql, params![action_id], map_row)
            .optional()?)
    }

    /// 查询某实体的全部日志（最新在前）
    pub fn find_by_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM action_log
             WHERE entity_type = ? AND entity_id = ?
             ORDER BY action_ts DESC, rowid DESC
            "#,
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![entity_type, entity_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 查询某类操作的日志
    pub fn find_by_type(&self, action_type: ActionType) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM action_log WHERE action_type = ? ORDER BY action_ts DESC, rowid DESC",
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![action_type.to_db_str()], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 最近 N 条日志
    pub fn find_recent(&self, limit: usize) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM action_log ORDER BY action_ts DESC, rowid DESC LIMIT ?",
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![limit as i64], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }
}

fn map_row(row: &Row<'_>) -> SqliteResult<ActionLog> {
    let payload_json: Option<String> = row.get(6)?;
    Ok(ActionLog {
        action_id: row.get(0)?,
        action_type: get_enum(row, 1, ActionType::from_db_str)?,
        action_ts: get_ts(row, 2)?,
        actor: row.get(3)?,
        entity_type: row.get(4)?,
        entity_id: row.get(5)?,
        // 载荷损坏时不阻断审计查询
        payload_json: payload_json.and_then(|s| serde_json::from_str(&s).ok()),
        detail: row.get(7)?,
    })
}

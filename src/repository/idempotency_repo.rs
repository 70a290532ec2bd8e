// ==========================================
// 物资集散中心 - 幂等键仓储
// ==========================================
// 出库定稿 / 分拣处理的服务端重复提交防护
// 结果以 JSON 持久化，重放时原样返回
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// 幂等键对应的操作名
pub const OP_DISPATCH_FINALIZE: &str = "dispatch.finalize";
pub const OP_TRIAGE_PROCESS: &str = "triage.process";

pub struct IdempotencyRepository;

impl IdempotencyRepository {
    /// 查找已存储的结果
    ///
    /// # 返回
    /// - Ok(Some(T)): 同一操作已执行过，返回存储的结果
    /// - Ok(None): 键未使用
    /// - Err(DuplicateRequest): 键已被其他操作占用
    pub fn lookup_with<T: DeserializeOwned>(
        conn: &Connection,
        key: &str,
        operation: &str,
    ) -> RepositoryResult<Option<T>> {
        let stored: Option<(String, String)> = conn
            .query_row(
                "SELECT operacion, resultado_json FROM idempotency_keys WHERE clave = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match stored {
            None => Ok(None),
            Some((stored_op, _)) if stored_op != operation => {
                Err(RepositoryError::DuplicateRequest {
                    key: key.to_string(),
                })
            }
            Some((_, json)) => Ok(Some(serde_json::from_str(&json)?)),
        }
    }

    /// 记录结果（与业务写入同一事务）
    pub fn record_with<T: Serialize>(
        conn: &Connection,
        key: &str,
        operation: &str,
        result: &T,
    ) -> RepositoryResult<()> {
        let json = serde_json::to_string(result)?;
        conn.execute(
            "INSERT INTO idempotency_keys (clave, operacion, resultado_json) VALUES (?1, ?2, ?3)",
            params![key, operation, json],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::initialize_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_replay_returns_stored_result() {
        let conn = setup();
        assert!(IdempotencyRepository::lookup_with::<i64>(&conn, "k1", OP_DISPATCH_FINALIZE)
            .unwrap()
            .is_none());

        IdempotencyRepository::record_with(&conn, "k1", OP_DISPATCH_FINALIZE, &42i64).unwrap();
        let replay: Option<i64> =
            IdempotencyRepository::lookup_with(&conn, "k1", OP_DISPATCH_FINALIZE).unwrap();
        assert_eq!(replay, Some(42));
    }

    #[test]
    fn test_key_reused_for_other_operation() {
        let conn = setup();
        IdempotencyRepository::record_with(&conn, "k1", OP_DISPATCH_FINALIZE, &1i64).unwrap();
        let err = IdempotencyRepository::lookup_with::<i64>(&conn, "k1", OP_TRIAGE_PROCESS)
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateRequest { .. }));
    }
}

// ==========================================
// 物资集散中心 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::workflow_config_trait::WorkflowConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::types::{AllocationPolicy, TriageDecrementPolicy};
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 写入（覆盖）global scope 的配置值
    pub fn set(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let key = key.trim();
        if key.is_empty() {
            return Err("配置键不能为空".into());
        }

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value.trim()],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(json!(config_map).to_string())
    }
}

// ==========================================
// WorkflowConfigReader Trait 实现
// ==========================================
impl WorkflowConfigReader for ConfigManager {
    fn allocation_policy(&self) -> Result<AllocationPolicy, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::ALLOCATION_POLICY, "single_lot")?;
        AllocationPolicy::from_db_str(&value.to_lowercase())
            .ok_or_else(|| format!("无效的分配策略: {}", value).into())
    }

    fn triage_decrement_policy(&self) -> Result<TriageDecrementPolicy, Box<dyn Error>> {
        let policy =
            self.get_config_or_default(config_keys::TRIAGE_DECREMENT_POLICY, "fixed_per_session")?;
        match policy.to_lowercase().as_str() {
            "fixed_per_session" => {
                let units = self.get_config_or_default(config_keys::TRIAGE_DECREMENT_UNITS, "1")?;
                let units = units
                    .parse::<i64>()
                    .map_err(|_| format!("无效的分拣扣减单位: {}", units))?;
                if units < 0 {
                    return Err(format!("分拣扣减单位不能为负: {}", units).into());
                }
                Ok(TriageDecrementPolicy::FixedPerSession(units))
            }
            "processed_total" => Ok(TriageDecrementPolicy::ProcessedTotal),
            other => Err(format!("无效的分拣扣减策略: {}", other).into()),
        }
    }

    fn cap_to_stock(&self) -> Result<bool, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::DISPATCH_CAP_TO_STOCK, "false")?;
        Ok(matches!(value.to_lowercase().as_str(), "true" | "1" | "yes"))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 出库分配
    pub const ALLOCATION_POLICY: &str = "allocation.policy";
    pub const DISPATCH_CAP_TO_STOCK: &str = "dispatch.cap_to_stock";

    // 分拣
    pub const TRIAGE_DECREMENT_POLICY: &str = "triage.decrement_policy";
    pub const TRIAGE_DECREMENT_UNITS: &str = "triage.decrement_units";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::initialize_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = setup();
        assert_eq!(config.allocation_policy().unwrap(), AllocationPolicy::SingleLot);
        assert_eq!(
            config.triage_decrement_policy().unwrap(),
            TriageDecrementPolicy::FixedPerSession(1)
        );
        assert!(!config.cap_to_stock().unwrap());
    }

    #[test]
    fn test_set_overrides_and_snapshot() {
        let config = setup();
        config.set(config_keys::ALLOCATION_POLICY, "multi_lot").unwrap();
        config.set(config_keys::TRIAGE_DECREMENT_POLICY, "processed_total").unwrap();
        config.set(config_keys::ALLOCATION_POLICY, "MULTI_LOT").unwrap();

        assert_eq!(config.allocation_policy().unwrap(), AllocationPolicy::MultiLot);
        assert_eq!(
            config.triage_decrement_policy().unwrap(),
            TriageDecrementPolicy::ProcessedTotal
        );

        let snapshot: serde_json::Value = serde_json::from_str(&config.snapshot().unwrap()).unwrap();
        assert_eq!(snapshot["allocation.policy"], "MULTI_LOT");
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let config = setup();
        config.set(config_keys::ALLOCATION_POLICY, "random").unwrap();
        assert!(config.allocation_policy().is_err());

        config.set(config_keys::TRIAGE_DECREMENT_UNITS, "abc").unwrap();
        assert!(config.triage_decrement_policy().is_err());
    }
}

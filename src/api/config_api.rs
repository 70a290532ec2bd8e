// ==========================================
// 物资集散中心 - 配置管理 API
// ==========================================
// 职责: 配置查询、更新、快照
// 红线: 仅管理员可写；写入前按键校验取值
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::config_keys;
use crate::config::ConfigManager;
use crate::domain::types::{AllocationPolicy, UserRole};
use crate::domain::user::Actor;

/// 单个配置项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub key: String,
    pub value: Option<String>,
}

/// 可写入的配置键
pub const KNOWN_KEYS: &[&str] = &[
    config_keys::ALLOCATION_POLICY,
    config_keys::DISPATCH_CAP_TO_STOCK,
    config_keys::TRIAGE_DECREMENT_POLICY,
    config_keys::TRIAGE_DECREMENT_UNITS,
];

/// 校验配置取值
fn validate_value(key: &str, value: &str) -> ApiResult<()> {
    let value = value.trim().to_lowercase();
    let ok = match key {
        config_keys::ALLOCATION_POLICY => AllocationPolicy::from_db_str(&value).is_some(),
        config_keys::DISPATCH_CAP_TO_STOCK => {
            matches!(value.as_str(), "true" | "false" | "1" | "0" | "yes" | "no")
        }
        config_keys::TRIAGE_DECREMENT_POLICY => {
            matches!(value.as_str(), "fixed_per_session" | "processed_total")
        }
        config_keys::TRIAGE_DECREMENT_UNITS => value.parse::<i64>().map_or(false, |n| n >= 0),
        _ => {
            return Err(ApiError::InvalidInput(format!("未知配置键: {}", key)));
        }
    };
    if !ok {
        return Err(ApiError::InvalidInput(format!("配置值无效: {}={}", key, value)));
    }
    Ok(())
}

pub struct ConfigApi {
    config_manager: Arc<ConfigManager>,
}

impl ConfigApi {
    pub fn new(config_manager: Arc<ConfigManager>) -> Self {
        Self { config_manager }
    }

    /// 查询所有已知配置项（未设置的返回 None，表示使用默认值）
    pub fn list_configs(&self) -> ApiResult<Vec<ConfigItem>> {
        KNOWN_KEYS
            .iter()
            .map(|key| {
                let value = self
                    .config_manager
                    .get_global_config_value(key)
                    .map_err(|e| ApiError::DatabaseError(e.to_string()))?;
                Ok(ConfigItem {
                    key: key.to_string(),
                    value,
                })
            })
            .collect()
    }

    /// 更新配置
    ///
    /// # 参数
    /// - actor: 操作人（须为管理员）
    /// - key: 配置键
    /// - value: 配置值
    pub fn update_config(&self, actor: &Actor, key: &str, value: &str) -> ApiResult<()> {
        if actor.role != UserRole::Admin {
            return Err(ApiError::PermissionDenied(format!(
                "仅管理员可修改配置: user={}",
                actor.user_id
            )));
        }
        let key = key.trim();
        validate_value(key, value)?;

        self.config_manager
            .set(key, value)
            .map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        info!(key, value, actor = %actor.user_id, "配置已更新");
        Ok(())
    }

    /// 全部 global 配置快照（JSON）
    pub fn get_config_snapshot(&self) -> ApiResult<String> {
        self.config_manager
            .snapshot()
            .map_err(|e| ApiError::DatabaseError(e.to_string()))
    }
}

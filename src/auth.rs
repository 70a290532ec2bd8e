// ==========================================
// 物资集散中心 - 认证辅助
// ==========================================
// 1. 认证/数据库错误 → 本地化提示（固定查找表）
// 2. 服务端访问检查: 档案可用 + 角色权限
// ==========================================

use crate::domain::user::{Actor, Permission, UserProfile};
use crate::i18n::t;
use chrono::NaiveDateTime;
use thiserror::Error;

/// 错误消息子串 → 翻译键（按顺序匹配，不区分大小写）
const AUTH_ERROR_TABLE: &[(&str, &str)] = &[
    ("Invalid login credentials", "auth.invalid_credentials"),
    ("Email not confirmed", "auth.email_not_confirmed"),
    ("User not found", "auth.user_not_found"),
    ("User already registered", "auth.already_registered"),
    ("Password should be at least 6 characters", "auth.password_too_short"),
    ("Unable to validate email address: invalid format", "auth.invalid_email_format"),
    ("Signup requires a valid password", "auth.invalid_password"),
    ("Failed to fetch", "auth.connection_failed"),
    ("NetworkError", "auth.network_error"),
    ("duplicate key value violates unique constraint", "auth.email_taken"),
    ("permission denied", "auth.permission_denied"),
];

/// PostgreSQL 唯一约束错误码
const UNIQUE_VIOLATION_CODE: &str = "23505";

/// 将认证相关错误转换为本地化提示
///
/// 未命中查找表时返回原始消息；原始消息为空时返回通用提示
pub fn localize_auth_error(message: &str, code: Option<&str>) -> String {
    let lowered = message.to_lowercase();
    if !lowered.is_empty() {
        if let Some((_, key)) = AUTH_ERROR_TABLE
            .iter()
            .find(|(needle, _)| lowered.contains(&needle.to_lowercase()))
        {
            return t(key);
        }
    }

    if code == Some(UNIQUE_VIOLATION_CODE) {
        return t("auth.email_taken");
    }

    if message.trim().is_empty() {
        t("common.generic_error")
    } else {
        message.to_string()
    }
}

// ==========================================
// 访问检查
// ==========================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccessError {
    #[error("账号已停用或已过期: {0}")]
    InactiveAccount(String),

    #[error("无权限: user={user_id}, permission={permission:?}")]
    PermissionDenied {
        user_id: String,
        permission: Permission,
    },
}

/// 校验档案在 `now` 时刻可用，并转换为操作人
pub fn actor_for(profile: &UserProfile, now: NaiveDateTime) -> Result<Actor, AccessError> {
    if !profile.is_usable_at(now) {
        return Err(AccessError::InactiveAccount(profile.id.clone()));
    }
    Ok(profile.to_actor())
}

/// 校验操作人拥有权限
pub fn require_permission(actor: &Actor, permission: Permission) -> Result<(), AccessError> {
    if actor.can(permission) {
        Ok(())
    } else {
        Err(AccessError::PermissionDenied {
            user_id: actor.user_id.clone(),
            permission,
        })
    }
}

// ==========================================
// 物资集散中心 - 用户管理 API
// ==========================================
// 职责: 登录校验、档案列表、启用/停用、开通、名册导入
// 红线: 管理操作仅限 UserAdmin 权限
// ==========================================

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::auth::{actor_for, require_permission};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::user::{Actor, Permission, ProvisionRequest, UserProfile};
use crate::engine::provisioning::{SqliteUserProvisioner, UserProvisioner};
use crate::importer::{RosterImportReport, RosterImporter};
use crate::repository::{ActionLogRepository, RepositoryError, UserRepository};

/// 身份类错误转换为 ProvisioningError，其余按常规映射
fn identity_error(err: RepositoryError) -> ApiError {
    match err {
        RepositoryError::ValidationError(msg) | RepositoryError::UniqueConstraintViolation(msg) => {
            ApiError::ProvisioningError(msg)
        }
        other => other.into(),
    }
}

pub struct UserApi {
    user_repo: Arc<UserRepository>,
    provisioner: Arc<SqliteUserProvisioner>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl UserApi {
    pub fn new(
        user_repo: Arc<UserRepository>,
        provisioner: Arc<SqliteUserProvisioner>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            user_repo,
            provisioner,
            action_log_repo,
        }
    }

    // ==========================================
    // 登录
    // ==========================================

    /// 邮箱 + 口令登录
    ///
    /// # 返回
    /// - Ok(Actor): 可用于后续调用的操作人身份
    /// - Err(ApiError::ProvisioningError): 凭证错误
    /// - Err(ApiError::InactiveAccount): 账号停用或已过期
    pub fn sign_in(&self, email: &str, password: &str) -> ApiResult<Actor> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ApiError::ProvisioningError(
                "Invalid login credentials".to_string(),
            ));
        }
        let profile = self
            .provisioner
            .authenticate(email.trim(), password)
            .map_err(identity_error)?;
        let actor = actor_for(&profile, chrono::Local::now().naive_local())?;
        info!(user_id = %actor.user_id, role = %actor.role, "登录成功");
        Ok(actor)
    }

    /// 按 id 解析操作人（校验启用状态与失效时间）
    pub fn resolve_actor(&self, user_id: &str) -> ApiResult<Actor> {
        let profile = self.get_user(user_id)?;
        Ok(actor_for(&profile, chrono::Local::now().naive_local())?)
    }

    // ==========================================
    // 档案查询
    // ==========================================

    pub fn list_users(&self, actor: &Actor) -> ApiResult<Vec<UserProfile>> {
        require_permission(actor, Permission::UserAdmin)?;
        Ok(self.user_repo.list()?)
    }

    pub fn get_user(&self, user_id: &str) -> ApiResult<UserProfile> {
        if user_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("用户ID不能为空".to_string()));
        }
        self.user_repo
            .find_by_id(user_id)?
            .ok_or_else(|| ApiError::NotFound(format!("UserProfile(id={})不存在", user_id)))
    }

    // ==========================================
    // 启用 / 停用
    // ==========================================

    /// 设置账号启用标志
    pub fn set_active(&self, actor: &Actor, user_id: &str, active: bool) -> ApiResult<UserProfile> {
        require_permission(actor, Permission::UserAdmin)?;
        if !active && actor.user_id == user_id {
            return Err(ApiError::BusinessRuleViolation("不能停用自己的账号".to_string()));
        }
        self.user_repo.set_active(user_id, active)?;

        let log = ActionLog::new(ActionType::UserStatusChange, &actor.user_id)
            .with_entity("UserProfile", user_id)
            .with_payload(json!({ "active": active }));
        self.action_log_repo.insert(&log)?;

        self.get_user(user_id)
    }

    /// 批量停用
    ///
    /// # 返回
    /// - Ok(usize): 实际停用的数量（已停用的账号不计）
    pub fn deactivate_many(&self, actor: &Actor, user_ids: &[String]) -> ApiResult<usize> {
        require_permission(actor, Permission::UserAdmin)?;
        let targets: Vec<String> = user_ids
            .iter()
            .filter(|id| **id != actor.user_id)
            .cloned()
            .collect();
        let count = self.user_repo.deactivate_many(&targets)?;

        let log = ActionLog::new(ActionType::UserStatusChange, &actor.user_id)
            .with_entity("UserProfile", "*")
            .with_payload(json!({ "active": false, "user_ids": targets, "count": count }));
        self.action_log_repo.insert(&log)?;

        info!(count, "批量停用完成");
        Ok(count)
    }

    // ==========================================
    // 开通
    // ==========================================

    /// 开通单个账号（缺省口令为临时口令）
    pub fn provision(&self, actor: &Actor, request: &ProvisionRequest) -> ApiResult<UserProfile> {
        require_permission(actor, Permission::UserAdmin)?;
        self.provisioner
            .provision(actor, request)
            .map_err(identity_error)
    }

    /// 从 CSV / Excel 名册批量开通
    pub fn import_roster<P: AsRef<Path>>(
        &self,
        actor: &Actor,
        file_path: P,
    ) -> ApiResult<RosterImportReport> {
        require_permission(actor, Permission::UserAdmin)?;
        let importer = RosterImporter::new(Arc::clone(&self.provisioner));
        Ok(importer.import_file(actor, file_path)?)
    }
}

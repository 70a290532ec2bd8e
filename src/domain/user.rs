// ==========================================
// 物资集散中心 - 用户档案与权限
// ==========================================
// 所有写操作显式携带 Actor，核心逻辑不读取任何全局会话
// ==========================================

use crate::domain::types::UserRole;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// UserProfile - 用户档案 (perfiles)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub active: bool,
    /// 临时账号（危机志愿者）的失效时间
    pub active_until: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl UserProfile {
    /// 在给定时刻是否可用
    pub fn is_usable_at(&self, now: NaiveDateTime) -> bool {
        self.active && self.active_until.map_or(true, |until| now < until)
    }

    /// 转换为操作人身份
    pub fn to_actor(&self) -> Actor {
        Actor {
            user_id: self.id.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }
}

// ==========================================
// Actor - 操作人身份
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub name: String,
    pub role: UserRole,
}

impl Actor {
    /// 直接构造操作人，不做任何账号校验
    ///
    /// 面向终端用户的入口必须通过 `UserApi::sign_in` / `UserApi::resolve_actor`
    /// （内部为 `auth::actor_for`）取得 Actor；直接构造仅限进程内的系统任务与测试。
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            role,
        }
    }

    /// 是否拥有某权限
    pub fn can(&self, permission: Permission) -> bool {
        role_permissions(self.role).contains(&permission)
    }
}

// ==========================================
// Permission - 功能权限
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Donors,        // donantes
    Products,      // productos
    Lots,          // lotes
    Intake,        // ingresos（含危机入库）
    CrisisIntake,  // ingresos:crisis
    Dispatch,      // egresos
    Beneficiaries, // beneficiarios
    Triage,        // triaje
    Reports,       // reportes:read
    UserAdmin,     // 用户管理
}

impl Permission {
    pub const ALL: &'static [Permission] = &[
        Permission::Donors,
        Permission::Products,
        Permission::Lots,
        Permission::Intake,
        Permission::CrisisIntake,
        Permission::Dispatch,
        Permission::Beneficiaries,
        Permission::Triage,
        Permission::Reports,
        Permission::UserAdmin,
    ];
}

/// 角色 → 权限表
pub fn role_permissions(role: UserRole) -> &'static [Permission] {
    match role {
        UserRole::Admin => Permission::ALL,
        UserRole::Operator => &[
            Permission::Donors,
            Permission::Products,
            Permission::Lots,
            Permission::Intake,
            Permission::CrisisIntake,
            Permission::Dispatch,
            Permission::Beneficiaries,
        ],
        UserRole::Volunteer => &[Permission::CrisisIntake, Permission::Triage],
        UserRole::Auditor => &[Permission::Reports],
        UserRole::Student => &[Permission::Donors, Permission::Dispatch],
    }
}

/// 开通账号请求（特权开通函数的入参）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub email: String,
    pub password: Option<String>,
    pub name: String,
    pub role: UserRole,
    pub active_until: Option<NaiveDateTime>,
}

/// 未指定口令时使用的临时口令
pub const DEFAULT_TEMP_PASSWORD: &str = "Temporal123!";

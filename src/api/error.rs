// ==========================================
// 物资集散中心 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换下层错误为用户友好的错误消息
// 展示: user_message() 返回本地化提示，由调用方以 toast 形式呈现
// ==========================================

use crate::auth::AccessError;
use crate::engine::dispatch_wizard::WizardError;
use crate::i18n::{t, t_with_args};
use crate::importer::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("库存不足: lot_id={lot_id}, available={available}, requested={requested}")]
    InsufficientStock {
        lot_id: i64,
        available: i64,
        requested: i64,
    },

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("并发修改: {entity} id={id}")]
    ConcurrentModification { entity: String, id: String },

    #[error("重复请求: {0}")]
    DuplicateRequest(String),

    // ==========================================
    // 权限错误
    // ==========================================
    #[error("无权限: {0}")]
    PermissionDenied(String),

    #[error("账号不可用: {0}")]
    InactiveAccount(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入 / 存储 / 开通
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("凭证存储失败: {0}")]
    StorageError(String),

    #[error("账号开通失败: {0}")]
    ProvisioningError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::OptimisticLockFailure { entity, id, .. } => {
                ApiError::ConcurrentModification { entity, id }
            }
            RepositoryError::DuplicateRequest { key } => ApiError::DuplicateRequest(key),

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }

            // 业务规则错误
            RepositoryError::InsufficientStock {
                lot_id,
                available,
                requested,
            } => ApiError::InsufficientStock {
                lot_id,
                available,
                requested,
            },
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }

            // 数据质量错误
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<WizardError> for ApiError {
    fn from(err: WizardError) -> Self {
        ApiError::InvalidInput(err.to_string())
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::InactiveAccount(_) => ApiError::InactiveAccount(err.to_string()),
            AccessError::PermissionDenied { .. } => ApiError::PermissionDenied(err.to_string()),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        ApiError::ImportError(err.to_string())
    }
}

/// 发生错误的操作（决定通用提示文案）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Dispatch,
    DispatchState,
    Triage,
    Intake,
    Other,
}

impl ApiError {
    /// 本地化的用户提示
    pub fn user_message(&self, operation: Operation) -> String {
        match self {
            ApiError::NotFound(_) => t("errors.not_found"),
            ApiError::InvalidInput(reason) | ApiError::ValidationError(reason) => {
                t_with_args("errors.invalid_input", &[("reason", reason)])
            }
            ApiError::ConcurrentModification { id, .. } => {
                t_with_args("dispatch.lot_conflict", &[("lot", id)])
            }
            ApiError::PermissionDenied(_) => t("auth.permission_denied"),
            ApiError::InactiveAccount(_) => t("auth.account_inactive"),
            ApiError::ProvisioningError(msg) => crate::auth::localize_auth_error(msg, None),
            _ => match operation {
                Operation::Dispatch => t("dispatch.save_failed"),
                Operation::DispatchState => t("dispatch.state_failed"),
                Operation::Triage => t("triage.save_failed"),
                Operation::Intake => t("intake.save_failed"),
                Operation::Other => t("common.generic_error"),
            },
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

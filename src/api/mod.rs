// ==========================================
// 物资集散中心 - API 层
// ==========================================
// 职责: 提供业务 API 接口，校验权限并转换错误
// ==========================================
// 信任边界:
// - 各 API 只校验传入 Actor 的角色权限，不回查账号状态
// - 来自外部的请求必须先经 UserApi::sign_in / resolve_actor 得到 Actor，
//   停用或过期的账号在那里被拒绝
// ==========================================

pub mod catalog_api;
pub mod config_api;
pub mod dispatch_api;
pub mod error;
pub mod intake_api;
pub mod inventory_api;
pub mod report_api;
pub mod triage_api;
pub mod user_api;

// 重导出核心类型
pub use catalog_api::{CatalogApi, CategoryOption};
pub use config_api::{ConfigApi, ConfigItem};
pub use dispatch_api::DispatchApi;
pub use error::{ApiError, ApiResult, Operation};
pub use intake_api::IntakeApi;
pub use inventory_api::InventoryApi;
pub use report_api::ReportApi;
pub use triage_api::TriageApi;
pub use user_api::UserApi;

// ==========================================
// 物资集散中心 - 应用层
// ==========================================
// 职责: 组装仓储、引擎与 API，提供默认数据库位置
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};

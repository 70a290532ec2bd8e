// ==========================================
// 物资集散中心 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约定: `*_with(&Connection, ..)` 关联函数供事务内调用
// ==========================================

pub mod action_log_repo;
pub mod beneficiary_repo;
pub mod db_utils;
pub mod discard_repo;
pub mod dispatch_repo;
pub mod donor_repo;
pub mod error;
pub mod idempotency_repo;
pub mod intake_repo;
pub mod kit_repo;
pub mod lot_repo;
pub mod product_repo;
pub mod report_repo;
pub mod user_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use beneficiary_repo::BeneficiaryRepository;
pub use discard_repo::DiscardRepository;
pub use dispatch_repo::DispatchRepository;
pub use donor_repo::DonorRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use idempotency_repo::IdempotencyRepository;
pub use intake_repo::IntakeRepository;
pub use kit_repo::KitRepository;
pub use lot_repo::LotRepository;
pub use product_repo::ProductRepository;
pub use report_repo::ReportRepository;
pub use user_repo::{NewIdentity, UserRepository};

// ==========================================
// 物资集散中心 - 核心库
// ==========================================
// 业务: 人道主义物资的入库、分拣、FEFO 出库与追溯
// 技术栈: Rust + SQLite
// 分层: domain → repository → engine → api → app
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "es");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务流程
pub mod engine;

// 导入层 - 志愿者名册
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// 认证与授权（错误文案本地化、权限校验）
pub mod auth;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AllocationPolicy, Climate, DispatchReason, DispatchState, DonorType, LotState,
    ProductCategory, TransportType, UserRole,
};

// 领域实体
pub use domain::{
    ActionLog, ActionType, Actor, Beneficiary, Dispatch, DispatchDraft, Donor, Kit, Lot, Product,
    UserProfile,
};

// 引擎
pub use engine::{
    DispatchFinalizer, DispatchStateMachine, DispatchWizard, IntakeService, TriageProcessor,
};

// API
pub use api::{ApiError, ApiResult, CatalogApi, DispatchApi, InventoryApi, TriageApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "Centro de Acopio";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

// ==========================================
// 物资集散中心 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、纯业务规则
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod beneficiary;
pub mod dispatch;
pub mod kit;
pub mod lot;
pub mod product;
pub mod report;
pub mod triage;
pub mod types;
pub mod user;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use beneficiary::{Beneficiary, NewBeneficiary};
pub use dispatch::{
    Dispatch, DispatchDetail, DispatchDraft, DispatchLine, DispatchLineView, DraftLine,
    NewDispatch, ShortageRecord,
};
pub use kit::{Kit, KitInput, KitItem};
pub use lot::{FefoLotView, Lot, NewLot, StockSummary};
pub use product::{Donor, NewDonor, NewProduct, Product, ProductUpdate};
pub use report::{CategoryTotal, DashboardStats, ImpactSummaryRow, ReasonTotal};
pub use triage::{
    BulkMeasure, ClassifiedItem, DiscardItem, DiscardRecord, IntakeLog, NewIntakeLog,
    PendingTriageItem,
};
pub use types::{
    AllocationPolicy, Climate, DispatchReason, DispatchState, DonorType, IntakeType, LotState,
    ProductCategory, TransportType, TriageDecrementPolicy, UserRole,
};
pub use user::{Actor, Permission, ProvisionRequest, UserProfile};

// ==========================================
// 物资集散中心 - 流程配置读取 Trait
// ==========================================
// 职责: 定义出库/分拣流程所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::{AllocationPolicy, TriageDecrementPolicy};
use std::error::Error;

// ==========================================
// WorkflowConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）；测试中可用固定值实现
pub trait WorkflowConfigReader: Send + Sync {
    /// 批次分配策略
    ///
    /// # 默认值
    /// - single_lot
    fn allocation_policy(&self) -> Result<AllocationPolicy, Box<dyn Error>>;

    /// 分拣源批次扣减策略
    ///
    /// # 默认值
    /// - fixed_per_session，每次 1 个单位
    fn triage_decrement_policy(&self) -> Result<TriageDecrementPolicy, Box<dyn Error>>;

    /// 加入购物车时是否按库存封顶
    ///
    /// # 默认值
    /// - false（库存仅作参考）
    fn cap_to_stock(&self) -> Result<bool, Box<dyn Error>>;
}

// ==========================================
// 物资集散中心 - 库存批次领域模型
// ==========================================
// 不变量: 0 <= current_quantity <= initial_quantity
// 数量归零即转为 Exhausted；Discarded 为人工终态
// ==========================================

use crate::domain::types::LotState;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Lot - 库存批次
// ==========================================
// 对齐: lotes 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub id: i64,
    pub code: String, // codigo (人类可读编码)
    pub product_id: i64,
    pub donor_id: Option<i64>,
    pub intake_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>, // None 表示“不过期”
    pub initial_quantity: i64,
    pub current_quantity: i64,
    pub state: LotState,
    pub notes: Option<String>,
    /// 乐观锁版本号，每次数量/状态变更 +1
    pub revision: i64,
    pub created_at: NaiveDateTime,
    pub created_by: Option<String>,
}

impl Lot {
    /// 是否可参与 FEFO 分配
    pub fn is_allocatable(&self) -> bool {
        self.state == LotState::Available && self.current_quantity > 0
    }

    /// 距离过期的天数（无过期日返回 None）
    pub fn days_to_expiry(&self, today: NaiveDate) -> Option<i64> {
        self.expiry_date
            .map(|d| d.signed_duration_since(today).num_days())
    }
}

/// 新建批次参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLot {
    pub product_id: i64,
    pub donor_id: Option<i64>,
    pub intake_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub quantity: i64,
    pub state: LotState,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

/// 扣减后的批次数量与状态
///
/// # 规则
/// - 结果为 0 → Exhausted
/// - 结果 > 0 → 保持原状态
/// - 扣减量超过现存量 → None（调用方按库存不足处理）
pub fn quantity_after_decrement(
    current: i64,
    state: LotState,
    amount: i64,
) -> Option<(i64, LotState)> {
    if amount < 0 || amount > current {
        return None;
    }
    let remaining = current - amount;
    let next_state = if remaining == 0 {
        LotState::Exhausted
    } else {
        state
    };
    Some((remaining, next_state))
}

// ==========================================
// 库存汇总视图
// ==========================================
// 对齐: v_stock_actual
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSummary {
    pub product_id: i64,
    pub product_name: String,
    pub category: String,
    pub climate: String,
    pub unit_of_measure: String,
    pub total_stock: i64,
    pub next_expiry: Option<NaiveDate>,
    pub lot_count: i64,
}

/// FEFO 批次视图（含剩余天数）
// 对齐: v_lotes_fefo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FefoLotView {
    pub lot_id: i64,
    pub code: String,
    pub product_id: i64,
    pub product_name: String,
    pub current_quantity: i64,
    pub expiry_date: NaiveDate,
    pub days_to_expiry: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrement_to_zero_exhausts_lot() {
        let result = quantity_after_decrement(10, LotState::Available, 10);
        assert_eq!(result, Some((0, LotState::Exhausted)));
    }

    #[test]
    fn test_partial_decrement_keeps_state() {
        let result = quantity_after_decrement(10, LotState::Available, 3);
        assert_eq!(result, Some((7, LotState::Available)));
    }

    #[test]
    fn test_decrement_beyond_stock_is_rejected() {
        assert_eq!(quantity_after_decrement(4, LotState::Available, 5), None);
        assert_eq!(quantity_after_decrement(4, LotState::Available, -1), None);
    }
}

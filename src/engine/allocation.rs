// ==========================================
// 物资集散中心 - FEFO 批次分配引擎
// ==========================================
// 职责: 给定 (产品, 申请量, 实发量) 与候选批次，生成分配方案
// 红线: 纯函数，不访问数据库；扣减由出库定稿流程执行
// ==========================================
// SingleLot（默认）:
//   只取最早过期的一个批次；实发 = min(实发量, 批次余量)
//   批次不足只产生部分出库，不自动生成损耗
// MultiLot（显式开启的行为变更）:
//   申请量与实发量分别按 FEFO 顺序拆分到多个批次
// 两种策略下，损耗只由更正差额 (申请 - 实发) 驱动
// ==========================================

use crate::domain::lot::Lot;
use crate::domain::types::AllocationPolicy;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ==========================================
// 分配方案
// ==========================================

/// 方案中的一个批次切片，对应一条出库行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSlice {
    pub lot_id: i64,
    /// 读取候选时的批次版本，扣减时做比较交换
    pub expected_revision: i64,
    /// 计入该行的申请数量
    pub requested: i64,
    /// 从该批次实际扣减的数量
    pub dispatched: i64,
}

/// 损耗记录意图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortageIntent {
    pub lot_id: i64,
    pub quantity: i64,
}

/// 单个购物车行的分配方案
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub product_id: i64,
    pub requested: i64,
    pub real: i64,
    pub slices: Vec<AllocationSlice>,
    pub shortage: Option<ShortageIntent>,
    /// 候选批次无法覆盖实发量的部分（仅提示，不生成损耗）
    pub uncovered: i64,
}

impl AllocationPlan {
    /// 是否没有任何可用批次
    pub fn has_no_lot(&self) -> bool {
        self.slices.is_empty()
    }

    /// 实际扣减总量
    pub fn total_dispatched(&self) -> i64 {
        self.slices.iter().map(|s| s.dispatched).sum()
    }
}

// ==========================================
// FEFO 排序
// ==========================================

/// FEFO 比较: 过期日升序，无过期日排最后，同日按 id
pub fn fefo_cmp(a: &Lot, b: &Lot) -> Ordering {
    match (a.expiry_date, b.expiry_date) {
        (Some(x), Some(y)) => x.cmp(&y).then(a.id.cmp(&b.id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    }
}

/// 过滤出可分配批次并按 FEFO 排序
pub fn fefo_candidates(lots: &[Lot], product_id: i64) -> Vec<&Lot> {
    let mut candidates: Vec<&Lot> = lots
        .iter()
        .filter(|l| l.product_id == product_id && l.is_allocatable())
        .collect();
    candidates.sort_by(|a, b| fefo_cmp(a, b));
    candidates
}

// ==========================================
// 方案生成
// ==========================================

/// 为一个购物车行生成分配方案
///
/// # 参数
/// - `policy`: 分配策略
/// - `product_id`: 产品
/// - `candidates`: 候选批次（任意顺序，内部按 FEFO 过滤排序）
/// - `requested`: 申请数量（系统数量）
/// - `real`: 更正后的实发数量
pub fn plan_allocation(
    policy: AllocationPolicy,
    product_id: i64,
    candidates: &[Lot],
    requested: i64,
    real: i64,
) -> AllocationPlan {
    let ordered = fefo_candidates(candidates, product_id);
    let real = real.max(0);

    let mut plan = AllocationPlan {
        product_id,
        requested,
        real,
        slices: Vec::new(),
        shortage: None,
        uncovered: 0,
    };

    if ordered.is_empty() {
        plan.uncovered = real;
        return plan;
    }

    match policy {
        AllocationPolicy::SingleLot => {
            let lot = ordered[0];
            let dispatched = real.min(lot.current_quantity);
            plan.slices.push(AllocationSlice {
                lot_id: lot.id,
                expected_revision: lot.revision,
                requested,
                dispatched,
            });
            plan.uncovered = real - dispatched;
        }
        AllocationPolicy::MultiLot => {
            // 申请量与实发量各自按 FEFO 贪心填充
            let mut remaining_requested = requested;
            let mut remaining_real = real;
            for lot in &ordered {
                if remaining_requested <= 0 && remaining_real <= 0 {
                    break;
                }
                let req = remaining_requested.clamp(0, lot.current_quantity);
                let disp = remaining_real.clamp(0, lot.current_quantity);
                remaining_requested -= req;
                remaining_real -= disp;
                plan.slices.push(AllocationSlice {
                    lot_id: lot.id,
                    expected_revision: lot.revision,
                    requested: req,
                    dispatched: disp,
                });
            }
            // 无法覆盖的申请量计入最后一行，保证行申请量之和等于申请量
            if remaining_requested > 0 {
                if let Some(last) = plan.slices.last_mut() {
                    last.requested += remaining_requested;
                }
            }
            plan.uncovered = remaining_real.max(0);
        }
    }

    if real < requested {
        let charged = match policy {
            AllocationPolicy::SingleLot => plan.slices.first(),
            AllocationPolicy::MultiLot => plan.slices.last(),
        };
        plan.shortage = charged.map(|slice| ShortageIntent {
            lot_id: slice.lot_id,
            quantity: requested - real,
        });
    }

    plan
}

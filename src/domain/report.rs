// ==========================================
// 物资集散中心 - 报表数据模型
// ==========================================
// 只提供数据，不含图表渲染
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 单个出库单的影响汇总
// 对齐: v_impacto_resumen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactSummaryRow {
    pub dispatch_id: i64,
    pub code: String,
    pub reason: String,
    pub beneficiary: String,
    pub province: Option<String>,
    pub dispatch_date: NaiveDateTime,
    pub product_lines: i64,
    pub total_units: i64,
    pub estimated_value: f64,
}

/// 按产品类别汇总的出库量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total_quantity: i64,
    pub estimated_value: f64,
}

/// 按出库原因汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonTotal {
    pub reason: String,
    pub dispatch_count: i64,
    pub total_units: i64,
    pub estimated_value: f64,
}

/// 仪表盘统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_donors: i64,
    pub total_products: i64,
    pub total_beneficiaries: i64,
    pub total_dispatches: i64,
    /// 入库单价 × 数量 之和
    pub total_donated_value: f64,
    /// 已服务受益方的估计人口之和
    pub people_served: i64,
}

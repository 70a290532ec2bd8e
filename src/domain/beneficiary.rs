// ==========================================
// 物资集散中心 - 受益方领域模型
// ==========================================
// 出库向导中快速新建，之后仅允许人工编辑
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// 对齐: beneficiarios 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub id: i64,
    pub name: String,
    pub sector: Option<String>,
    pub province: Option<String>,
    pub canton: Option<String>,
    pub parish: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub estimated_population: Option<i64>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewBeneficiary {
    pub name: String,
    pub sector: Option<String>,
    pub province: Option<String>,
    pub canton: Option<String>,
    pub parish: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub estimated_population: Option<i64>,
    pub notes: Option<String>,
}

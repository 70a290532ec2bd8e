// ==========================================
// 物资集散中心 - 出库领域模型
// ==========================================
// Dispatch    : 出库单（定稿时一次性创建）
// DispatchLine: 出库行（购物车行 × 分配批次）
// Shortage    : 损耗记录（实发 < 申请时生成）
// ==========================================

use crate::domain::types::{DispatchReason, DispatchState, TransportType};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// 更正环节产生的损耗原因（固定文本）
pub const SHORTAGE_REASON_RECTIFICATION: &str = "Rectificación en Despacho";

// ==========================================
// Dispatch - 出库单
// ==========================================
// 对齐: despachos 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispatch {
    pub id: i64,
    pub code: String,
    pub beneficiary_id: i64,
    pub reason: DispatchReason,
    pub reason_detail: Option<String>,
    pub dispatch_date: NaiveDateTime,
    pub state: DispatchState,
    pub transport_type: TransportType,
    pub transport_cost: f64,
    pub was_rectified: bool,
    pub rectification_notes: Option<String>,
    pub prepared_by: String,
    pub validated_by: Option<String>,
    pub validated_at: Option<NaiveDateTime>,
    pub delivered_at: Option<NaiveDateTime>,
    pub evidence_url: Option<String>,
    pub revision: i64,
}

// ==========================================
// DispatchLine - 出库行 (egresos)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchLine {
    pub id: i64,
    pub dispatch_id: i64,
    /// 无可用批次时为 None（该行不扣减库存）
    pub lot_id: Option<i64>,
    pub product_id: i64,
    pub requested_quantity: i64,
    /// 实发数量；更正前可为 None
    pub dispatched_quantity: Option<i64>,
    pub created_at: NaiveDateTime,
}

// ==========================================
// ShortageRecord - 损耗 (mermas)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortageRecord {
    pub id: i64,
    pub dispatch_id: i64,
    pub lot_id: i64,
    pub shortfall_quantity: i64,
    pub reason: Option<String>,
    pub recorded_at: NaiveDateTime,
    pub recorded_by: String,
}

/// 写入出库单头所需字段
#[derive(Debug, Clone)]
pub struct NewDispatch {
    pub code: String,
    pub beneficiary_id: i64,
    pub reason: DispatchReason,
    pub reason_detail: Option<String>,
    pub dispatch_date: NaiveDateTime,
    pub state: DispatchState,
    pub transport_type: TransportType,
    pub transport_cost: f64,
    pub prepared_by: String,
}

/// 出库单明细行（带产品名与批次编码）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchLineView {
    pub line_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub lot_id: Option<i64>,
    pub lot_code: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub requested_quantity: i64,
    pub dispatched_quantity: Option<i64>,
}

/// 出库单详情
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchDetail {
    pub dispatch: Dispatch,
    pub beneficiary_name: String,
    pub lines: Vec<DispatchLineView>,
    pub shortages: Vec<ShortageRecord>,
}

// ==========================================
// DispatchDraft - 出库草稿（向导产出，定稿入参）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchDraft {
    pub beneficiary_id: i64,
    pub reason: DispatchReason,
    pub reason_detail: Option<String>,
    pub transport_type: TransportType,
    pub transport_cost: f64,
    /// 购物车顺序即处理顺序
    pub lines: Vec<DraftLine>,
    /// 服务端防重复提交
    pub idempotency_key: Option<String>,
}

/// 草稿行: 申请数量 + 更正后的实发数量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftLine {
    pub temp_id: String,
    pub product_id: i64,
    pub requested_quantity: i64,
    pub real_quantity: i64,
}

/// 生成出库单编码: DES-YYYYMMDD-NNNN
pub fn dispatch_code(date: NaiveDate, sequence: i64) -> String {
    format!("DES-{}-{:04}", date.format("%Y%m%d"), sequence)
}

/// 生成批次编码: LT-YYYYMMDD-NNNN
pub fn lot_code(date: NaiveDate, sequence: i64) -> String {
    format!("LT-{}-{:04}", date.format("%Y%m%d"), sequence)
}

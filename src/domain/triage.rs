// ==========================================
// 物资集散中心 - 入库日志 / 分拣领域模型
// ==========================================
// 危机入库产生一个“待分拣”批次，分拣时拆分为已分类批次 + 报废记录
// ==========================================

use crate::domain::types::IntakeType;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// 危机入库使用的通用产品名
pub const GENERIC_PRODUCT_NAME: &str = "DONACIÓN POR CLASIFICAR";

// ==========================================
// IntakeLog - 入库日志 (ingresos)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeLog {
    pub id: i64,
    pub lot_id: i64,
    pub intake_type: IntakeType,
    pub quantity: i64,
    pub bulk_description: Option<String>,
    pub estimated_weight: Option<f64>,
    pub triage_pending: bool,
    pub unit_price: Option<f64>,
    pub intake_at: NaiveDateTime,
    pub recorded_by: String,
}

/// 写入入库日志所需字段
#[derive(Debug, Clone)]
pub struct NewIntakeLog {
    pub lot_id: i64,
    pub intake_type: IntakeType,
    pub quantity: i64,
    pub bulk_description: Option<String>,
    pub estimated_weight: Option<f64>,
    pub triage_pending: bool,
    pub unit_price: Option<f64>,
    pub recorded_by: String,
}

// ==========================================
// DiscardRecord - 报废 (descartes)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscardRecord {
    pub id: i64,
    pub product_id: Option<i64>,
    pub description: String,
    pub quantity: i64,
    pub discard_reason: String,
    pub source_lot_id: Option<i64>,
    pub discarded_at: NaiveDateTime,
    pub recorded_by: String,
}

/// 待分拣队列项
// 对齐: v_triaje_pendiente
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTriageItem {
    pub intake_id: i64,
    pub lot_id: i64,
    pub lot_code: String,
    pub current_quantity: i64,
    pub bulk_description: Option<String>,
    pub estimated_weight: Option<f64>,
    pub intake_at: NaiveDateTime,
    pub recorded_by: String,
}

/// 分拣结果中的一条已分类物品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedItem {
    pub product_id: i64,
    pub quantity: i64,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// 分拣结果中的一条报废
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscardItem {
    pub description: String,
    pub quantity: i64,
    pub discard_reason: String,
    pub product_id: Option<i64>,
}

/// 危机入库计量方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkMeasure {
    Bags,   // 按袋/包计数
    Weight, // 按公斤
}

impl BulkMeasure {
    /// 入库日志中的描述文本
    pub fn describe(&self, quantity: i64) -> String {
        match self {
            BulkMeasure::Bags => format!("Ingreso por Bultos ({})", quantity),
            BulkMeasure::Weight => format!("Ingreso por Peso ({}kg)", quantity),
        }
    }
}

// ==========================================
// 物资集散中心 - 套装模板
// ==========================================
// 套装加入购物车时展开为独立行，之后与模板不再关联
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 套装模板
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kit {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub created_by: Option<String>,
    /// 模板行（按 orden 排序）
    pub items: Vec<KitItem>,
}

/// 套装模板行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitItem {
    pub product_id: i64,
    pub product_name: String,
    pub reference_price: f64,
    pub quantity: i64,
}

/// 新建/更新套装参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KitInput {
    pub name: String,
    pub description: Option<String>,
    /// (product_id, quantity)，顺序即展开顺序
    pub items: Vec<(i64, i64)>,
}

// ==========================================
// 物资集散中心 - 产品与捐赠人领域模型
// ==========================================
// 产品只停用不删除；捐赠人按名称“查找或创建”
// ==========================================

use crate::domain::types::{Climate, DonorType, ProductCategory};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Product - 产品目录
// ==========================================
// 对齐: productos 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,                // nombre
    pub category: ProductCategory,   // categoria
    pub climate: Climate,            // clima
    pub unit_of_measure: String,     // unidad_medida
    pub reference_price: f64,        // precio_referencial
    pub description: Option<String>, // descripcion
    pub active: bool,                // activo
    pub created_at: NaiveDateTime,
}

/// 新建产品参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category: ProductCategory,
    pub climate: Climate,
    pub unit_of_measure: String,
    pub reference_price: f64,
    pub description: Option<String>,
}

impl NewProduct {
    /// 以默认值构造（气候通用、单位 "unidad"、参考价 0）
    pub fn new(name: impl Into<String>, category: ProductCategory) -> Self {
        Self {
            name: name.into(),
            category,
            climate: Climate::Both,
            unit_of_measure: "unidad".to_string(),
            reference_price: 0.0,
            description: None,
        }
    }
}

/// 产品部分更新（None 表示不修改）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub category: Option<ProductCategory>,
    pub climate: Option<Climate>,
    pub unit_of_measure: Option<String>,
    pub reference_price: Option<f64>,
    pub description: Option<Option<String>>,
    pub active: Option<bool>,
}

// ==========================================
// Donor - 捐赠人
// ==========================================
// 对齐: donantes 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donor {
    pub id: i64,
    pub name: String,
    pub donor_type: DonorType,
    pub is_anonymous: bool,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub created_by: Option<String>,
}

/// 新建捐赠人参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDonor {
    pub name: String,
    pub donor_type: DonorType,
    pub is_anonymous: bool,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

impl NewDonor {
    pub fn new(name: impl Into<String>, donor_type: DonorType) -> Self {
        Self {
            name: name.into(),
            is_anonymous: donor_type == DonorType::Anonymous,
            donor_type,
            phone: None,
            email: None,
            address: None,
            notes: None,
        }
    }
}

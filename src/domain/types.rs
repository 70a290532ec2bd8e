// ==========================================
// 物资集散中心 - 领域类型定义
// ==========================================
// 枚举的数据库取值沿用业务侧西语代码（与 schema CHECK 约束一致）
// 解析失败返回 None，由仓储层在边界处拒绝未知取值
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 为“数据库字符串 <-> 枚举”生成 to_db_str / from_db_str / Display / ALL
macro_rules! db_enum {
    ($name:ident { $($variant:ident => $db:literal),+ $(,)? }) => {
        impl $name {
            /// 全部取值（按声明顺序）
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// 转换为数据库存储的字符串
            pub fn to_db_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $db),+
                }
            }

            /// 从数据库字符串解析
            pub fn from_db_str(s: &str) -> Option<Self> {
                match s.trim() {
                    $($db => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.to_db_str())
            }
        }
    };
}

// ==========================================
// 产品类别 (Product Category)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Food,      // 食品
    Clothing,  // 衣物
    Hygiene,   // 卫生用品
    Medicine,  // 药品
    Toys,      // 玩具
    Household, // 家居用品
    Other,     // 其他
}

db_enum!(ProductCategory {
    Food => "alimentos",
    Clothing => "ropa",
    Hygiene => "higiene",
    Medicine => "medicamentos",
    Toys => "juguetes",
    Household => "enseres",
    Other => "otros",
});

// ==========================================
// 气候适用性 (Climate)
// ==========================================
// 海岸（炎热）/ 山区（寒冷）/ 通用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Climate {
    Coast,
    Highland,
    Both,
}

db_enum!(Climate {
    Coast => "costa",
    Highland => "sierra",
    Both => "ambos",
});

// ==========================================
// 捐赠人类型 (Donor Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonorType {
    Individual,
    Organization,
    Anonymous,
}

db_enum!(DonorType {
    Individual => "persona",
    Organization => "empresa",
    Anonymous => "anonimo",
});

// ==========================================
// 批次状态 (Lot State)
// ==========================================
// 生命周期:
// - 常规入库 → Available；危机入库 → PendingTriage
// - 数量归零 → Exhausted；人工标记 → Discarded（终态）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotState {
    Available,
    PendingTriage,
    Exhausted,
    Discarded,
}

db_enum!(LotState {
    Available => "disponible",
    PendingTriage => "triaje_pendiente",
    Exhausted => "agotado",
    Discarded => "descartado",
});

// ==========================================
// 出库单状态 (Dispatch State)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Preparing,  // 准备中
    Validated,  // 已审核
    Dispatched, // 已发出
    EnRoute,    // 运输中
    Completed,  // 已送达（终态）
    Cancelled,  // 已取消（终态）
    Rectified,  // 已更正
}

db_enum!(DispatchState {
    Preparing => "preparando",
    Validated => "validado",
    Dispatched => "despachado",
    EnRoute => "en_camino",
    Completed => "completado",
    Cancelled => "cancelado",
    Rectified => "rectificado",
});

impl DispatchState {
    /// 是否为终态（不允许再迁出）
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchState::Completed | DispatchState::Cancelled)
    }
}

// ==========================================
// 出库原因 (Dispatch Reason)
// ==========================================
// Other 必须附带文字说明
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchReason {
    Earthquake,
    Flood,
    Fire,
    Landslide,
    Drought,
    Pandemic,
    ExtremePoverty,
    Other,
}

db_enum!(DispatchReason {
    Earthquake => "terremoto",
    Flood => "inundacion",
    Fire => "incendio",
    Landslide => "deslizamiento",
    Drought => "sequia",
    Pandemic => "pandemia",
    ExtremePoverty => "pobreza_extrema",
    Other => "otro",
});

// ==========================================
// 运输方式 (Transport Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    Institutional, // 机构自有车辆，费用固定为 0
    External,      // 外部运输，需录入费用
}

db_enum!(TransportType {
    Institutional => "institucional",
    External => "externo",
});

// ==========================================
// 入库类型 (Intake Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeType {
    Normal,
    Crisis,
}

db_enum!(IntakeType {
    Normal => "normal",
    Crisis => "crisis",
});

// ==========================================
// 用户角色 (User Role)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Operator,
    Volunteer,
    Auditor,
    Student,
}

db_enum!(UserRole {
    Admin => "admin",
    Operator => "operador",
    Volunteer => "voluntario",
    Auditor => "auditor",
    Student => "estudiante",
});

// ==========================================
// 批次分配策略 (Allocation Policy)
// ==========================================
// SingleLot: 只取最早过期的一个批次（默认）
// MultiLot : 按 FEFO 顺序跨批次拆分（行为变更，需显式开启）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    SingleLot,
    MultiLot,
}

db_enum!(AllocationPolicy {
    SingleLot => "single_lot",
    MultiLot => "multi_lot",
});

// ==========================================
// 分拣源批次扣减策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageDecrementPolicy {
    /// 每次分拣固定扣减 N 个单位（默认 N = 1）
    FixedPerSession(i64),
    /// 按本次已分类 + 报废的数量之和扣减
    ProcessedTotal,
}

impl TriageDecrementPolicy {
    /// 计算本次分拣对源批次的扣减量
    pub fn decrement_for(&self, classified_total: i64, discarded_total: i64) -> i64 {
        match self {
            TriageDecrementPolicy::FixedPerSession(units) => (*units).max(0),
            TriageDecrementPolicy::ProcessedTotal => (classified_total + discarded_total).max(0),
        }
    }
}

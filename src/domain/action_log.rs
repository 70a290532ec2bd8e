// ==========================================
// 物资集散中心 - 操作日志领域模型
// ==========================================
// 红线: 所有库存写入必须留痕
// 对齐: action_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub action_type: ActionType,
    pub action_ts: NaiveDateTime,
    pub actor: String, // 操作人 user_id

    // ===== 关联实体 =====
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,

    // ===== 操作负载 =====
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

impl ActionLog {
    /// 以当前时间创建日志
    pub fn new(action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type,
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            entity_type: None,
            entity_id: None,
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_entity(mut self, entity_type: &str, entity_id: impl ToString) -> Self {
        self.entity_type = Some(entity_type.to_string());
        self.entity_id = Some(entity_id.to_string());
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    IntakeNormal,        // 常规入库
    IntakeCrisis,        // 危机入库
    DispatchFinalize,    // 出库定稿
    DispatchStateChange, // 出库状态变更
    TriageProcess,       // 分拣处理
    LotDiscard,          // 批次人工报废
    CatalogChange,       // 目录维护（产品/套装）
    UserProvision,       // 开通账号
    UserStatusChange,    // 启用/停用账号
}

impl ActionType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ActionType::IntakeNormal => "INTAKE_NORMAL",
            ActionType::IntakeCrisis => "INTAKE_CRISIS",
            ActionType::DispatchFinalize => "DISPATCH_FINALIZE",
            ActionType::DispatchStateChange => "DISPATCH_STATE_CHANGE",
            ActionType::TriageProcess => "TRIAGE_PROCESS",
            ActionType::LotDiscard => "LOT_DISCARD",
            ActionType::CatalogChange => "CATALOG_CHANGE",
            ActionType::UserProvision => "USER_PROVISION",
            ActionType::UserStatusChange => "USER_STATUS_CHANGE",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "INTAKE_NORMAL" => Some(ActionType::IntakeNormal),
            "INTAKE_CRISIS" => Some(ActionType::IntakeCrisis),
            "DISPATCH_FINALIZE" => Some(ActionType::DispatchFinalize),
            "DISPATCH_STATE_CHANGE" => Some(ActionType::DispatchStateChange),
            "TRIAGE_PROCESS" => Some(ActionType::TriageProcess),
            "LOT_DISCARD" => Some(ActionType::LotDiscard),
            "CATALOG_CHANGE" => Some(ActionType::CatalogChange),
            "USER_PROVISION" => Some(ActionType::UserProvision),
            "USER_STATUS_CHANGE" => Some(ActionType::UserStatusChange),
            _ => None,
        }
    }
}

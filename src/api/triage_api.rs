// ==========================================
// 物资集散中心 - 分拣 API
// ==========================================
// 职责: 待分拣队列查询、分拣处理
// ==========================================

use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::auth::require_permission;
use crate::config::ConfigManager;
use crate::domain::triage::{DiscardRecord, PendingTriageItem};
use crate::domain::user::{Actor, Permission};
use crate::engine::triage::{TriageOutcome, TriageProcessor, TriageRequest};
use crate::repository::{DiscardRepository, IntakeRepository};

/// 分拣API
pub struct TriageApi {
    intake_repo: Arc<IntakeRepository>,
    discard_repo: Arc<DiscardRepository>,
    processor: Arc<TriageProcessor<ConfigManager>>,
}

impl TriageApi {
    pub fn new(
        intake_repo: Arc<IntakeRepository>,
        discard_repo: Arc<DiscardRepository>,
        processor: Arc<TriageProcessor<ConfigManager>>,
    ) -> Self {
        Self {
            intake_repo,
            discard_repo,
            processor,
        }
    }

    /// 待分拣队列（仍标记 triaje_pendiente 的危机入库，最早在前）
    pub fn list_pending(&self) -> ApiResult<Vec<PendingTriageItem>> {
        Ok(self.intake_repo.list_pending_triage()?)
    }

    /// 处理一次分拣
    ///
    /// # 参数
    /// - actor: 操作人
    /// - request: 源批次、已分类物品、报废项、幂等键
    ///
    /// # 返回
    /// - Ok(TriageOutcome): 新批次编码、源批次剩余量
    /// - Err(ApiError): 任何失败均无部分写入
    pub fn process(&self, actor: &Actor, request: &TriageRequest) -> ApiResult<TriageOutcome> {
        require_permission(actor, Permission::Triage)?;
        if request.classified.is_empty() && request.discards.is_empty() {
            return Err(ApiError::InvalidInput("分拣结果为空".to_string()));
        }
        Ok(self.processor.process(actor, request)?)
    }

    /// 某源批次产生的报废记录
    pub fn discards_for_lot(&self, lot_id: i64) -> ApiResult<Vec<DiscardRecord>> {
        Ok(self.discard_repo.list_by_source_lot(lot_id)?)
    }
}

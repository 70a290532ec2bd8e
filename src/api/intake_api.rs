// ==========================================
// 物资集散中心 - 入库 API
// ==========================================
// 职责: 常规入库、危机入库、入库记录查询
// ==========================================

use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::auth::require_permission;
use crate::domain::triage::IntakeLog;
use crate::domain::user::{Actor, Permission};
use crate::engine::intake::{
    CrisisIntakeOutcome, CrisisIntakeRequest, IntakeService, NormalIntakeOutcome,
    NormalIntakeRequest,
};
use crate::i18n::t;
use crate::repository::IntakeRepository;

pub struct IntakeApi {
    service: Arc<IntakeService>,
    intake_repo: Arc<IntakeRepository>,
}

impl IntakeApi {
    pub fn new(service: Arc<IntakeService>, intake_repo: Arc<IntakeRepository>) -> Self {
        Self {
            service,
            intake_repo,
        }
    }

    /// 常规入库
    ///
    /// 每个物品单独原子写入（批次 + 入库日志）；中途失败时已登记的物品保留。
    pub fn register_normal(
        &self,
        actor: &Actor,
        request: &NormalIntakeRequest,
    ) -> ApiResult<NormalIntakeOutcome> {
        require_permission(actor, Permission::Intake)?;
        if request.items.is_empty() {
            return Err(ApiError::InvalidInput(t("intake.no_items")));
        }
        Ok(self.service.register_normal(actor, request)?)
    }

    /// 危机入库（整包登记，进入待分拣）
    pub fn register_crisis(
        &self,
        actor: &Actor,
        request: &CrisisIntakeRequest,
    ) -> ApiResult<CrisisIntakeOutcome> {
        require_permission(actor, Permission::CrisisIntake)?;
        Ok(self.service.register_crisis(actor, request)?)
    }

    /// 最近的入库记录
    pub fn list_recent(&self, limit: usize) -> ApiResult<Vec<IntakeLog>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.intake_repo.list_recent(limit)?)
    }

    pub fn list_by_lot(&self, lot_id: i64) -> ApiResult<Vec<IntakeLog>> {
        Ok(self.intake_repo.list_by_lot(lot_id)?)
    }
}

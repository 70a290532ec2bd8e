// ==========================================
// 物资集散中心 - 库存查询 API
// ==========================================
// 职责: 库存汇总、FEFO 批次视图、批次人工报废
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde_json::json;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::auth::require_permission;
use crate::db;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::lot::{FefoLotView, Lot, StockSummary};
use crate::domain::triage::DiscardItem;
use crate::domain::types::LotState;
use crate::domain::user::{Actor, Permission};
use crate::repository::{
    ActionLogRepository, DiscardRepository, LotRepository, RepositoryError,
};

// ==========================================
// InventoryApi - 库存 API
// ==========================================
pub struct InventoryApi {
    conn: Arc<Mutex<Connection>>,
    lot_repo: Arc<LotRepository>,
}

impl InventoryApi {
    pub fn new(conn: Arc<Mutex<Connection>>, lot_repo: Arc<LotRepository>) -> Self {
        Self { conn, lot_repo }
    }

    /// 各产品当前库存（仅统计 disponible 批次）
    pub fn stock_summary(&self) -> ApiResult<Vec<StockSummary>> {
        Ok(self.lot_repo.stock_summary()?)
    }

    /// 单个产品当前库存
    ///
    /// # 返回
    /// - Ok(Some(StockSummary)): 启用产品的库存汇总（无批次时数量为 0）
    /// - Ok(None): 产品不存在或已停用
    pub fn stock_for_product(&self, product_id: i64) -> ApiResult<Option<StockSummary>> {
        Ok(self.lot_repo.stock_for_product(product_id)?)
    }

    /// FEFO 批次列表（含剩余天数），可按产品过滤
    pub fn fefo_view(&self, product_id: Option<i64>) -> ApiResult<Vec<FefoLotView>> {
        Ok(self.lot_repo.fefo_view(product_id)?)
    }

    pub fn lots_by_product(&self, product_id: i64) -> ApiResult<Vec<Lot>> {
        Ok(self.lot_repo.list_by_product(product_id)?)
    }

    pub fn lots_by_state(&self, state: LotState) -> ApiResult<Vec<Lot>> {
        Ok(self.lot_repo.list_by_state(state)?)
    }

    pub fn get_lot(&self, lot_id: i64) -> ApiResult<Lot> {
        self.lot_repo
            .find_by_id(lot_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Lot(id={})不存在", lot_id)))
    }

    /// 人工报废批次
    ///
    /// 批次置为 descartado（终态），剩余数量写入报废记录，同一事务内留痕。
    ///
    /// # 参数
    /// - actor: 操作人
    /// - lot_id: 批次ID
    /// - reason: 报废原因（必填）
    pub fn discard_lot(&self, actor: &Actor, lot_id: i64, reason: &str) -> ApiResult<Lot> {
        require_permission(actor, Permission::Lots)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ApiError::InvalidInput("报废原因不能为空".to_string()));
        }

        {
            let conn = self
                .conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            let tx = db::begin_immediate(&conn).map_err(RepositoryError::from)?;

            let lot = LotRepository::find_by_id_with(&tx, lot_id)?
                .ok_or_else(|| ApiError::NotFound(format!("Lot(id={})不存在", lot_id)))?;
            LotRepository::mark_discarded_with(&tx, lot_id, lot.revision)?;

            if lot.current_quantity > 0 {
                DiscardRepository::insert_with(
                    &tx,
                    &DiscardItem {
                        description: format!("Descarte manual de lote {}", lot.code),
                        quantity: lot.current_quantity,
                        discard_reason: reason.to_string(),
                        product_id: Some(lot.product_id),
                    },
                    Some(lot_id),
                    &actor.user_id,
                )?;
            }

            let log = ActionLog::new(ActionType::LotDiscard, &actor.user_id)
                .with_entity("Lot", lot_id)
                .with_payload(json!({
                    "code": lot.code,
                    "quantity": lot.current_quantity,
                    "previous_state": lot.state.to_db_str(),
                }))
                .with_detail(reason);
            ActionLogRepository::insert_with(&tx, &log)?;

            tx.commit().map_err(RepositoryError::from)?;
            info!(lot_id, code = %lot.code, "批次已人工报废");
        }

        self.get_lot(lot_id)
    }
}

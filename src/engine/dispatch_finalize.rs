// ==========================================
// 物资集散中心 - 出库定稿引擎
// ==========================================
// 输入: DispatchDraft + 显式 Actor
// 输出: 出库单（despachado）+ 出库行 + 损耗 + 批次扣减
// 红线: 全流程在一个 BEGIN IMMEDIATE 事务内，任一步失败整体回滚
// ==========================================
// 步骤:
// 1. 草稿校验（不写库）
// 2. 幂等键查找，命中则原样返回上次结果
// 3. 受益方存在性校验
// 4. 写出库单头
// 5. 按购物车顺序逐行: FEFO 候选 → 分配方案 → 出库行 → 扣减 → 损耗
// 6. 操作日志 + 幂等记录 + 提交
// ==========================================

use crate::config::WorkflowConfigReader;
use crate::db;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::dispatch::{
    Dispatch, DispatchDraft, NewDispatch, SHORTAGE_REASON_RECTIFICATION,
};
use crate::domain::types::{DispatchReason, DispatchState, TransportType};
use crate::domain::user::Actor;
use crate::engine::allocation::plan_allocation;
use crate::repository::idempotency_repo::OP_DISPATCH_FINALIZE;
use crate::repository::{
    ActionLogRepository, BeneficiaryRepository, DispatchRepository, IdempotencyRepository,
    LotRepository, RepositoryError, RepositoryResult,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

// ==========================================
// 定稿结果
// ==========================================

/// 分配提示（不阻断定稿）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllocationWarning {
    /// 没有可用批次: 出库行无批次引用，不扣减库存
    NoEligibleLot { product_id: i64, requested: i64 },
    /// 候选批次不足以覆盖实发量，仅部分出库
    PartialCoverage {
        product_id: i64,
        dispatched: i64,
        uncovered: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeOutcome {
    pub dispatch: Dispatch,
    pub line_count: usize,
    pub shortage_count: usize,
    pub warnings: Vec<AllocationWarning>,
    /// 是否为幂等重放（未产生任何写入）
    #[serde(default)]
    pub replayed: bool,
}

// ==========================================
// DispatchFinalizer - 出库定稿
// ==========================================
pub struct DispatchFinalizer<C>
where
    C: WorkflowConfigReader,
{
    conn: Arc<Mutex<Connection>>,
    config: Arc<C>,
}

impl<C> DispatchFinalizer<C>
where
    C: WorkflowConfigReader,
{
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<C>) -> Self {
        Self { conn, config }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 定稿出库
    ///
    /// # 参数
    /// - `actor`: 操作人（记为 preparado_por 与损耗登记人）
    /// - `draft`: 向导产出的草稿
    ///
    /// # 错误
    /// - `ValidationError`: 草稿不完整（未写库）
    /// - `NotFound`: 受益方不存在（未写库）
    /// - `OptimisticLockFailure` / `InsufficientStock`: 批次被并发修改，整单回滚
    /// - `DuplicateRequest`: 幂等键已用于其他操作
    #[instrument(skip(self, actor, draft), fields(
        actor = %actor.user_id,
        beneficiary_id = draft.beneficiary_id,
        lines = draft.lines.len()
    ))]
    pub fn finalize(&self, actor: &Actor, draft: &DispatchDraft) -> RepositoryResult<FinalizeOutcome> {
        validate_draft(draft)?;
        let policy = self
            .config
            .allocation_policy()
            .map_err(|e| RepositoryError::InternalError(format!("读取分配策略失败: {}", e)))?;

        let conn = self.get_conn()?;
        let tx = db::begin_immediate(&conn)?;

        if let Some(key) = draft.idempotency_key.as_deref() {
            if let Some(mut previous) =
                IdempotencyRepository::lookup_with::<FinalizeOutcome>(&tx, key, OP_DISPATCH_FINALIZE)?
            {
                info!(key, code = %previous.dispatch.code, "幂等重放，返回已定稿出库单");
                previous.replayed = true;
                return Ok(previous);
            }
        }

        let beneficiary = BeneficiaryRepository::find_by_id_with(&tx, draft.beneficiary_id)?
            .ok_or_else(|| RepositoryError::not_found("Beneficiary", draft.beneficiary_id))?;

        // === 出库单头 ===
        let now = chrono::Local::now().naive_local();
        let code = DispatchRepository::next_code_with(&tx, now.date())?;
        let transport_cost = match draft.transport_type {
            TransportType::Institutional => 0.0,
            TransportType::External => draft.transport_cost,
        };
        let dispatch_id = DispatchRepository::insert_header_with(
            &tx,
            &NewDispatch {
                code: code.clone(),
                beneficiary_id: beneficiary.id,
                reason: draft.reason,
                reason_detail: draft.reason_detail.clone(),
                dispatch_date: now,
                state: DispatchState::Dispatched,
                transport_type: draft.transport_type,
                transport_cost,
                prepared_by: actor.user_id.clone(),
            },
        )?;

        // === 逐行分配 ===
        let mut warnings = Vec::new();
        let mut line_count = 0usize;
        let mut shortage_count = 0usize;

        for line in &draft.lines {
            let candidates = LotRepository::find_fefo_candidates_with(&tx, line.product_id)?;
            let plan = plan_allocation(
                policy,
                line.product_id,
                &candidates,
                line.requested_quantity,
                line.real_quantity,
            );

            if plan.has_no_lot() {
                warn!(product_id = line.product_id, requested = line.requested_quantity, "无可用批次，出库行不关联批次");
                DispatchRepository::insert_line_with(
                    &tx,
                    dispatch_id,
                    None,
                    line.product_id,
                    line.requested_quantity,
                    Some(0),
                )?;
                line_count += 1;
                warnings.push(AllocationWarning::NoEligibleLot {
                    product_id: line.product_id,
                    requested: line.requested_quantity,
                });
                continue;
            }

            for slice in &plan.slices {
                DispatchRepository::insert_line_with(
                    &tx,
                    dispatch_id,
                    Some(slice.lot_id),
                    line.product_id,
                    slice.requested,
                    Some(slice.dispatched),
                )?;
                line_count += 1;
                if slice.dispatched > 0 {
                    LotRepository::decrement_with(
                        &tx,
                        slice.lot_id,
                        slice.dispatched,
                        slice.expected_revision,
                    )?;
                }
            }

            if plan.uncovered > 0 {
                warn!(
                    product_id = line.product_id,
                    dispatched = plan.total_dispatched(),
                    uncovered = plan.uncovered,
                    "批次余量不足，部分出库"
                );
                warnings.push(AllocationWarning::PartialCoverage {
                    product_id: line.product_id,
                    dispatched: plan.total_dispatched(),
                    uncovered: plan.uncovered,
                });
            }

            if let Some(shortage) = &plan.shortage {
                DispatchRepository::insert_shortage_with(
                    &tx,
                    dispatch_id,
                    shortage.lot_id,
                    shortage.quantity,
                    SHORTAGE_REASON_RECTIFICATION,
                    &actor.user_id,
                )?;
                shortage_count += 1;
            }
        }

        let dispatch = DispatchRepository::find_by_id_with(&tx, dispatch_id)?
            .ok_or_else(|| RepositoryError::not_found("Dispatch", dispatch_id))?;

        let log = ActionLog::new(ActionType::DispatchFinalize, &actor.user_id)
            .with_entity("Dispatch", dispatch_id)
            .with_payload(json!({
                "code": dispatch.code,
                "beneficiary_id": dispatch.beneficiary_id,
                "policy": policy.to_db_str(),
                "lines": line_count,
                "shortages": shortage_count,
                "warnings": warnings.len(),
            }));
        ActionLogRepository::insert_with(&tx, &log)?;

        let outcome = FinalizeOutcome {
            dispatch,
            line_count,
            shortage_count,
            warnings,
            replayed: false,
        };
        if let Some(key) = draft.idempotency_key.as_deref() {
            IdempotencyRepository::record_with(&tx, key, OP_DISPATCH_FINALIZE, &outcome)?;
        }

        tx.commit()?;
        info!(code = %outcome.dispatch.code, lines = line_count, shortages = shortage_count, "出库定稿完成");
        Ok(outcome)
    }
}

/// 草稿校验（与向导规则一致，服务端再校验一次）
pub fn validate_draft(draft: &DispatchDraft) -> RepositoryResult<()> {
    if draft.lines.is_empty() {
        return Err(RepositoryError::ValidationError("出库草稿没有任何行".to_string()));
    }
    if draft.reason == DispatchReason::Other
        && draft
            .reason_detail
            .as_deref()
            .map_or(true, |d| d.trim().is_empty())
    {
        return Err(RepositoryError::ValidationError(
            "出库原因为“其他”时必须填写说明".to_string(),
        ));
    }
    if draft.transport_type == TransportType::External
        && (!draft.transport_cost.is_finite() || draft.transport_cost < 0.0)
    {
        return Err(RepositoryError::ValidationError(format!(
            "运输费用无效: {}",
            draft.transport_cost
        )));
    }
    for line in &draft.lines {
        if line.requested_quantity <= 0 {
            return Err(RepositoryError::FieldValueError {
                field: "cantidad_solicitada".to_string(),
                message: format!("申请数量必须大于 0: {}", line.requested_quantity),
            });
        }
        if line.real_quantity < 0 {
            return Err(RepositoryError::FieldValueError {
                field: "cantidad_despachada".to_string(),
                message: format!("实发数量不能为负: {}", line.real_quantity),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dispatch::DraftLine;

    fn draft(lines: Vec<DraftLine>) -> DispatchDraft {
        DispatchDraft {
            beneficiary_id: 1,
            reason: DispatchReason::Flood,
            reason_detail: None,
            transport_type: TransportType::Institutional,
            transport_cost: 0.0,
            lines,
            idempotency_key: None,
        }
    }

    fn line(requested: i64, real: i64) -> DraftLine {
        DraftLine {
            temp_id: "t".to_string(),
            product_id: 1,
            requested_quantity: requested,
            real_quantity: real,
        }
    }

    #[test]
    fn test_validate_draft_rules() {
        assert!(validate_draft(&draft(vec![line(2, 2)])).is_ok());
        assert!(validate_draft(&draft(vec![])).is_err());
        assert!(validate_draft(&draft(vec![line(0, 0)])).is_err());
        assert!(validate_draft(&draft(vec![line(2, -1)])).is_err());

        let mut other = draft(vec![line(1, 1)]);
        other.reason = DispatchReason::Other;
        assert!(matches!(
            validate_draft(&other),
            Err(RepositoryError::ValidationError(_))
        ));

        let mut external = draft(vec![line(1, 1)]);
        external.transport_type = TransportType::External;
        external.transport_cost = f64::NAN;
        assert!(validate_draft(&external).is_err());
    }
}

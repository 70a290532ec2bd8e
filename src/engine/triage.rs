// ==========================================
// 物资集散中心 - 分拣处理引擎
// ==========================================
// 输入: 待分拣源批次 + 已分类物品 + 报废
// 输出: 新的可用批次（继承捐赠人）+ 入库日志 + 报废记录 + 源批次扣减
// 红线: 源批次不存在时不写库；其余步骤在同一事务内
// ==========================================
// 源批次扣减由 triage.decrement_policy 决定:
// - fixed_per_session: 每次固定 N 个单位（默认 1，一次处理一袋）
// - processed_total  : 按本次分类 + 报废数量之和
// 结果在 0 处截断；归零时源批次转 agotado 并移出待分拣队列
// ==========================================

use crate::config::WorkflowConfigReader;
use crate::db;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::lot::NewLot;
use crate::domain::triage::{ClassifiedItem, DiscardItem, NewIntakeLog};
use crate::domain::types::{IntakeType, LotState};
use crate::domain::user::Actor;
use crate::repository::idempotency_repo::OP_TRIAGE_PROCESS;
use crate::repository::{
    ActionLogRepository, DiscardRepository, IdempotencyRepository, IntakeRepository,
    LotRepository, ProductRepository, RepositoryError, RepositoryResult,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

/// 分拣请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageRequest {
    pub source_lot_id: i64,
    pub classified: Vec<ClassifiedItem>,
    pub discards: Vec<DiscardItem>,
    pub idempotency_key: Option<String>,
}

/// 分拣结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageOutcome {
    pub source_lot_id: i64,
    pub source_code: String,
    pub decremented_by: i64,
    pub source_remaining: i64,
    pub source_state: LotState,
    /// 新建批次编码（与 classified 顺序一致）
    pub created_lot_codes: Vec<String>,
    pub created_lot_ids: Vec<i64>,
    pub discard_ids: Vec<i64>,
    #[serde(default)]
    pub replayed: bool,
}

// ==========================================
// TriageProcessor - 分拣处理
// ==========================================
pub struct TriageProcessor<C>
where
    C: WorkflowConfigReader,
{
    conn: Arc<Mutex<Connection>>,
    config: Arc<C>,
}

impl<C> TriageProcessor<C>
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

    /// 处理一次分拣
    ///
    /// # 错误
    /// - `NotFound`: 源批次或分类产品不存在（未写库）
    /// - `InvalidStateTransition`: 源批次不处于 triaje_pendiente
    /// - `ValidationError` / `FieldValueError`: 数量或文字字段无效
    /// - `OptimisticLockFailure`: 源批次被并发修改
    #[instrument(skip(self, actor, request), fields(
        source_lot_id = request.source_lot_id,
        classified = request.classified.len(),
        discards = request.discards.len(),
        actor = %actor.user_id
    ))]
    pub fn process(&self, actor: &Actor, request: &TriageRequest) -> RepositoryResult<TriageOutcome> {
        validate_request(request)?;
        let policy = self
            .config
            .triage_decrement_policy()
            .map_err(|e| RepositoryError::InternalError(format!("读取分拣扣减策略失败: {}", e)))?;

        let conn = self.get_conn()?;
        let tx = db::begin_immediate(&conn)?;

        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(mut previous) =
                IdempotencyRepository::lookup_with::<TriageOutcome>(&tx, key, OP_TRIAGE_PROCESS)?
            {
                info!(key, source = %previous.source_code, "幂等重放，返回已处理的分拣结果");
                previous.replayed = true;
                return Ok(previous);
            }
        }

        // === 源批次校验（任何写入之前）===
        let source = LotRepository::find_by_id_with(&tx, request.source_lot_id)?
            .ok_or_else(|| RepositoryError::not_found("Lot", request.source_lot_id))?;
        if source.state != LotState::PendingTriage {
            return Err(RepositoryError::InvalidStateTransition {
                from: source.state.to_db_str().to_string(),
                to: "triage".to_string(),
            });
        }
        for item in &request.classified {
            if ProductRepository::find_by_id_with(&tx, item.product_id)?.is_none() {
                return Err(RepositoryError::not_found("Product", item.product_id));
            }
        }

        // === 已分类物品 → 新批次 ===
        let today = chrono::Local::now().date_naive();
        let mut created_lot_ids = Vec::with_capacity(request.classified.len());
        let mut created_lot_codes = Vec::with_capacity(request.classified.len());
        for item in &request.classified {
            let lot = LotRepository::insert_with(
                &tx,
                &NewLot {
                    product_id: item.product_id,
                    donor_id: source.donor_id,
                    intake_date: today,
                    expiry_date: item.expiry_date,
                    quantity: item.quantity,
                    state: LotState::Available,
                    notes: Some(classified_note(&source.code, item.notes.as_deref())),
                    created_by: Some(actor.user_id.clone()),
                },
            )?;
            IntakeRepository::insert_with(
                &tx,
                &NewIntakeLog {
                    lot_id: lot.id,
                    intake_type: IntakeType::Normal,
                    quantity: item.quantity,
                    bulk_description: Some(format!("Derivado de Triaje {}", source.code)),
                    estimated_weight: None,
                    triage_pending: false,
                    unit_price: None,
                    recorded_by: actor.user_id.clone(),
                },
            )?;
            debug!(lot_code = %lot.code, product_id = item.product_id, quantity = item.quantity, "分拣生成新批次");
            created_lot_ids.push(lot.id);
            created_lot_codes.push(lot.code);
        }

        // === 报废 ===
        let mut discard_ids = Vec::with_capacity(request.discards.len());
        for discard in &request.discards {
            discard_ids.push(DiscardRepository::insert_with(
                &tx,
                discard,
                Some(source.id),
                &actor.user_id,
            )?);
        }

        // === 源批次扣减 ===
        let classified_total: i64 = request.classified.iter().map(|c| c.quantity).sum();
        let discarded_total: i64 = request.discards.iter().map(|d| d.quantity).sum();
        let decrement = policy.decrement_for(classified_total, discarded_total);
        let remaining = (source.current_quantity - decrement).max(0);
        let next_state = if remaining == 0 {
            LotState::Exhausted
        } else {
            source.state
        };
        LotRepository::set_quantity_and_state_with(
            &tx,
            source.id,
            remaining,
            next_state,
            source.revision,
        )?;
        if remaining == 0 {
            let cleared = IntakeRepository::clear_pending_for_lot_with(&tx, source.id)?;
            debug!(source = %source.code, cleared, "源批次已分拣完毕，移出待分拣队列");
        }

        let outcome = TriageOutcome {
            source_lot_id: source.id,
            source_code: source.code.clone(),
            decremented_by: source.current_quantity - remaining,
            source_remaining: remaining,
            source_state: next_state,
            created_lot_codes,
            created_lot_ids,
            discard_ids,
            replayed: false,
        };

        let log = ActionLog::new(ActionType::TriageProcess, &actor.user_id)
            .with_entity("Lot", source.id)
            .with_payload(json!({
                "source_code": outcome.source_code,
                "created_lots": outcome.created_lot_codes,
                "discards": outcome.discard_ids.len(),
                "classified_total": classified_total,
                "discarded_total": discarded_total,
                "decremented_by": outcome.decremented_by,
                "remaining": remaining,
            }));
        ActionLogRepository::insert_with(&tx, &log)?;

        if let Some(key) = request.idempotency_key.as_deref() {
            IdempotencyRepository::record_with(&tx, key, OP_TRIAGE_PROCESS, &outcome)?;
        }

        tx.commit()?;
        info!(
            source = %outcome.source_code,
            remaining,
            state = %next_state,
            "分拣处理完成"
        );
        Ok(outcome)
    }
}

fn classified_note(source_code: &str, notes: Option<&str>) -> String {
    match notes.map(str::trim).filter(|n| !n.is_empty()) {
        Some(notes) => format!("Clasificado desde bulto {} - {}", source_code, notes),
        None => format!("Clasificado desde bulto {}", source_code),
    }
}

fn validate_request(request: &TriageRequest) -> RepositoryResult<()> {
    for item in &request.classified {
        if item.quantity <= 0 {
            return Err(RepositoryError::FieldValueError {
                field: "cantidad".to_string(),
                message: format!("分类数量必须大于 0: {}", item.quantity),
            });
        }
    }
    for discard in &request.discards {
        if discard.quantity <= 0 {
            return Err(RepositoryError::FieldValueError {
                field: "cantidad".to_string(),
                message: format!("报废数量必须大于 0: {}", discard.quantity),
            });
        }
        if discard.description.trim().is_empty() || discard.discard_reason.trim().is_empty() {
            return Err(RepositoryError::ValidationError(
                "报废必须填写描述与原因".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classified_note_references_source() {
        assert_eq!(
            classified_note("LT-20260601-0003", Some(" talla M ")),
            "Clasificado desde bulto LT-20260601-0003 - talla M"
        );
        assert_eq!(
            classified_note("LT-20260601-0003", None),
            "Clasificado desde bulto LT-20260601-0003"
        );
    }

    #[test]
    fn test_discard_requires_description_and_reason() {
        let request = TriageRequest {
            source_lot_id: 1,
            classified: vec![],
            discards: vec![DiscardItem {
                description: "Ropa rota".to_string(),
                quantity: 2,
                discard_reason: " ".to_string(),
                product_id: None,
            }],
            idempotency_key: None,
        };
        assert!(matches!(
            validate_request(&request),
            Err(RepositoryError::ValidationError(_))
        ));
    }
}

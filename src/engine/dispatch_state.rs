// ==========================================
// 物资集散中心 - 出库单状态机
// ==========================================
// 定稿后的人工状态变更（不属于向导流程）
// 终态: completado / cancelado，不允许再迁出
// completado 需要送达凭证 URL，并记录送达时间
// ==========================================

use crate::db;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::dispatch::Dispatch;
use crate::domain::types::DispatchState;
use crate::domain::user::Actor;
use crate::repository::{ActionLogRepository, DispatchRepository, RepositoryError, RepositoryResult};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

/// 状态变更请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionRequest {
    /// 送达凭证（completado 必填）
    pub evidence_url: Option<String>,
    /// 更正说明（rectificado 时写入）
    pub notes: Option<String>,
}

/// 判断状态迁移是否合法
///
/// # 规则
/// - 终态不可迁出
/// - 不允许原地迁移
/// - preparando 只是定稿前的初始值，不可作为目标
pub fn check_transition(from: DispatchState, to: DispatchState) -> RepositoryResult<()> {
    let allowed = !from.is_terminal() && from != to && to != DispatchState::Preparing;
    if !allowed {
        return Err(RepositoryError::InvalidStateTransition {
            from: from.to_db_str().to_string(),
            to: to.to_db_str().to_string(),
        });
    }
    Ok(())
}

/// 应用迁移后的出库单（纯函数，不写库）
pub fn apply_transition(
    dispatch: &Dispatch,
    to: DispatchState,
    actor: &Actor,
    request: &TransitionRequest,
    now: chrono::NaiveDateTime,
) -> RepositoryResult<Dispatch> {
    check_transition(dispatch.state, to)?;

    let mut next = dispatch.clone();
    next.state = to;

    match to {
        DispatchState::Completed => {
            let url = request
                .evidence_url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .ok_or_else(|| {
                    RepositoryError::ValidationError("完成出库需要上传送达凭证".to_string())
                })?;
            next.evidence_url = Some(url.to_string());
            next.delivered_at = Some(now);
        }
        DispatchState::Validated => {
            next.validated_by = Some(actor.user_id.clone());
            next.validated_at = Some(now);
        }
        DispatchState::Rectified => {
            next.was_rectified = true;
            if let Some(notes) = request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                next.rectification_notes = Some(notes.to_string());
            }
        }
        _ => {}
    }
    Ok(next)
}

// ==========================================
// DispatchStateMachine - 状态变更服务
// ==========================================
pub struct DispatchStateMachine {
    conn: Arc<Mutex<Connection>>,
}

impl DispatchStateMachine {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 执行状态变更（带版本校验与操作日志）
    #[instrument(skip(self, actor, request), fields(dispatch_id = dispatch_id, to = %to, actor = %actor.user_id))]
    pub fn transition(
        &self,
        dispatch_id: i64,
        to: DispatchState,
        actor: &Actor,
        request: &TransitionRequest,
    ) -> RepositoryResult<Dispatch> {
        let conn = self.get_conn()?;
        let tx = db::begin_immediate(&conn)?;

        let current = DispatchRepository::find_by_id_with(&tx, dispatch_id)?
            .ok_or_else(|| RepositoryError::not_found("Dispatch", dispatch_id))?;
        let now = chrono::Local::now().naive_local();
        let next = apply_transition(&current, to, actor, request, now)?;

        DispatchRepository::update_with(&tx, &next)?;

        let log = ActionLog::new(ActionType::DispatchStateChange, &actor.user_id)
            .with_entity("Dispatch", dispatch_id)
            .with_payload(json!({
                "from": current.state.to_db_str(),
                "to": to.to_db_str(),
                "evidence_url": next.evidence_url,
            }));
        ActionLogRepository::insert_with(&tx, &log)?;

        let updated = DispatchRepository::find_by_id_with(&tx, dispatch_id)?
            .ok_or_else(|| RepositoryError::not_found("Dispatch", dispatch_id))?;
        tx.commit()?;

        info!(code = %updated.code, from = %current.state, "出库单状态已变更");
        Ok(updated)
    }
}

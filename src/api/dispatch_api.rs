// ==========================================
// 物资集散中心 - 出库 API
// ==========================================
// 职责: 出库向导辅助、定稿、查询、状态变更、送达凭证
// 红线: 定稿与状态变更由引擎在单个事务内完成
// ==========================================

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::auth::require_permission;
use crate::config::{ConfigManager, WorkflowConfigReader};
use crate::domain::dispatch::{Dispatch, DispatchDetail, DispatchDraft};
use crate::domain::types::DispatchState;
use crate::domain::user::{Actor, Permission};
use crate::engine::dispatch_finalize::{DispatchFinalizer, FinalizeOutcome};
use crate::engine::dispatch_state::{DispatchStateMachine, TransitionRequest};
use crate::engine::dispatch_wizard::{DispatchWizard, KitComponent};
use crate::engine::evidence::EvidenceStore;
use crate::repository::{DispatchRepository, KitRepository, LotRepository, ProductRepository};

/// 列表默认条数
pub const DEFAULT_LIST_LIMIT: usize = 100;

// ==========================================
// DispatchApi - 出库 API
// ==========================================

/// 出库API
///
/// 职责：
/// 1. 创建向导、按 id 加入产品/套装（附带参考库存）
/// 2. 定稿（FEFO 分配 + 损耗 + 留痕，整单原子）
/// 3. 出库单列表与详情
/// 4. 状态变更与送达凭证上传
pub struct DispatchApi {
    dispatch_repo: Arc<DispatchRepository>,
    product_repo: Arc<ProductRepository>,
    kit_repo: Arc<KitRepository>,
    lot_repo: Arc<LotRepository>,
    config: Arc<ConfigManager>,
    finalizer: Arc<DispatchFinalizer<ConfigManager>>,
    state_machine: Arc<DispatchStateMachine>,
    evidence_store: Arc<dyn EvidenceStore>,
}

impl DispatchApi {
    /// 创建新的DispatchApi实例
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dispatch_repo: Arc<DispatchRepository>,
        product_repo: Arc<ProductRepository>,
        kit_repo: Arc<KitRepository>,
        lot_repo: Arc<LotRepository>,
        config: Arc<ConfigManager>,
        finalizer: Arc<DispatchFinalizer<ConfigManager>>,
        state_machine: Arc<DispatchStateMachine>,
        evidence_store: Arc<dyn EvidenceStore>,
    ) -> Self {
        Self {
            dispatch_repo,
            product_repo,
            kit_repo,
            lot_repo,
            config,
            finalizer,
            state_machine,
            evidence_store,
        }
    }

    // ==========================================
    // 向导辅助
    // ==========================================

    /// 创建出库向导（按配置决定是否以库存封顶）
    pub fn new_wizard(&self, actor: &Actor) -> ApiResult<DispatchWizard> {
        require_permission(actor, Permission::Dispatch)?;
        let cap_to_stock = self
            .config
            .cap_to_stock()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        Ok(DispatchWizard::new(cap_to_stock))
    }

    /// 按产品 id 加入购物车，参考库存取自 v_stock_actual
    ///
    /// # 返回
    /// - Ok(String): 临时行 id
    pub fn add_product_to_wizard(
        &self,
        wizard: &mut DispatchWizard,
        product_id: i64,
        quantity: i64,
    ) -> ApiResult<String> {
        let product = self
            .product_repo
            .find_by_id(product_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Product(id={})不存在", product_id)))?;
        let stock = self
            .lot_repo
            .stock_for_product(product_id)?
            .map(|s| s.total_stock);
        Ok(wizard.add_product(&product, quantity, stock)?)
    }

    /// 按套装 id 展开加入购物车
    ///
    /// 每个组成产品读取当前启用状态与参考库存，与单品走同样的校验
    pub fn add_kit_to_wizard(
        &self,
        wizard: &mut DispatchWizard,
        kit_id: i64,
    ) -> ApiResult<Vec<String>> {
        let kit = self
            .kit_repo
            .find_by_id(kit_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Kit(id={})不存在", kit_id)))?;

        let mut components: Vec<KitComponent> = Vec::with_capacity(kit.items.len());
        for item in &kit.items {
            if components.iter().any(|c| c.product.id == item.product_id) {
                continue;
            }
            let product = self
                .product_repo
                .find_by_id(item.product_id)?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("Product(id={})不存在", item.product_id))
                })?;
            let available_stock = self
                .lot_repo
                .stock_for_product(item.product_id)?
                .map(|s| s.total_stock);
            components.push(KitComponent {
                product,
                available_stock,
            });
        }
        Ok(wizard.add_kit(&kit, &components)?)
    }

    // ==========================================
    // 定稿
    // ==========================================

    /// 定稿出库
    ///
    /// # 参数
    /// - actor: 操作人
    /// - draft: 向导产出的草稿
    ///
    /// # 返回
    /// - Ok(FinalizeOutcome): 出库单、行数、损耗数、分配提示
    /// - Err(ApiError): 任何失败均无部分写入
    pub fn finalize(&self, actor: &Actor, draft: &DispatchDraft) -> ApiResult<FinalizeOutcome> {
        require_permission(actor, Permission::Dispatch)?;
        let outcome = self.finalizer.finalize(actor, draft)?;
        if !outcome.warnings.is_empty() {
            warn!(
                code = %outcome.dispatch.code,
                warnings = outcome.warnings.len(),
                "出库定稿存在分配提示"
            );
        }
        Ok(outcome)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 出库单列表（最新在前）
    pub fn list_dispatches(&self, limit: Option<usize>) -> ApiResult<Vec<Dispatch>> {
        Ok(self.dispatch_repo.list(limit.unwrap_or(DEFAULT_LIST_LIMIT))?)
    }

    pub fn get_dispatch(&self, dispatch_id: i64) -> ApiResult<Dispatch> {
        self.dispatch_repo
            .find_by_id(dispatch_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Dispatch(id={})不存在", dispatch_id)))
    }

    pub fn get_dispatch_by_code(&self, code: &str) -> ApiResult<Dispatch> {
        if code.trim().is_empty() {
            return Err(ApiError::InvalidInput("出库单编码不能为空".to_string()));
        }
        self.dispatch_repo
            .find_by_code(code.trim())?
            .ok_or_else(|| ApiError::NotFound(format!("Dispatch(code={})不存在", code)))
    }

    /// 出库单详情（行、产品名、批次编码、损耗）
    pub fn get_detail(&self, dispatch_id: i64) -> ApiResult<DispatchDetail> {
        self.dispatch_repo
            .detail(dispatch_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Dispatch(id={})不存在", dispatch_id)))
    }

    // ==========================================
    // 状态变更
    // ==========================================

    /// 变更出库单状态
    pub fn transition(
        &self,
        actor: &Actor,
        dispatch_id: i64,
        to: DispatchState,
        request: &TransitionRequest,
    ) -> ApiResult<Dispatch> {
        require_permission(actor, Permission::Dispatch)?;
        Ok(self.state_machine.transition(dispatch_id, to, actor, request)?)
    }

    /// 上传送达凭证并完成出库
    ///
    /// 先上传图片取得 URL，再执行 → completado。状态变更失败时已上传的文件保留。
    pub async fn complete_with_evidence(
        &self,
        actor: &Actor,
        dispatch_id: i64,
        file_name: &str,
        bytes: &[u8],
        notes: Option<String>,
    ) -> ApiResult<Dispatch> {
        require_permission(actor, Permission::Dispatch)?;
        let dispatch = self.get_dispatch(dispatch_id)?;
        if dispatch.state.is_terminal() {
            return Err(ApiError::InvalidStateTransition {
                from: dispatch.state.to_db_str().to_string(),
                to: DispatchState::Completed.to_db_str().to_string(),
            });
        }

        let url = self
            .evidence_store
            .upload(&dispatch.code, file_name, bytes)
            .await
            .map_err(|e| ApiError::StorageError(e.to_string()))?;
        info!(code = %dispatch.code, url = %url, "送达凭证已上传");

        self.transition(
            actor,
            dispatch_id,
            DispatchState::Completed,
            &TransitionRequest {
                evidence_url: Some(url),
                notes,
            },
        )
    }
}

// ==========================================
// 物资集散中心 - 目录管理 API
// ==========================================
// 职责: 产品、捐赠人、受益方、套装的维护与查询
// 红线: 写操作显式传入操作人并校验权限
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::auth::require_permission;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::beneficiary::{Beneficiary, NewBeneficiary};
use crate::domain::kit::{Kit, KitInput};
use crate::domain::product::{Donor, NewDonor, NewProduct, Product, ProductUpdate};
use crate::domain::types::{DonorType, ProductCategory};
use crate::domain::user::{Actor, Permission};
use crate::repository::{
    ActionLogRepository, BeneficiaryRepository, DonorRepository, KitRepository,
    ProductRepository,
};

/// 产品分类选项（下拉框）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryOption {
    pub value: String,
    pub category: ProductCategory,
}

// ==========================================
// CatalogApi - 目录管理 API
// ==========================================

/// 目录管理API
///
/// 职责：
/// 1. 产品新建/修改/停用/检索
/// 2. 捐赠人检索/新建/按名称查找或新建
/// 3. 受益方快速新建/检索
/// 4. 套装模板维护
pub struct CatalogApi {
    product_repo: Arc<ProductRepository>,
    donor_repo: Arc<DonorRepository>,
    beneficiary_repo: Arc<BeneficiaryRepository>,
    kit_repo: Arc<KitRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl CatalogApi {
    /// 创建新的CatalogApi实例
    pub fn new(
        product_repo: Arc<ProductRepository>,
        donor_repo: Arc<DonorRepository>,
        beneficiary_repo: Arc<BeneficiaryRepository>,
        kit_repo: Arc<KitRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            product_repo,
            donor_repo,
            beneficiary_repo,
            kit_repo,
            action_log_repo,
        }
    }

    fn log_catalog_change(&self, actor: &Actor, entity: &str, id: i64, payload: serde_json::Value) {
        let log = ActionLog::new(ActionType::CatalogChange, &actor.user_id)
            .with_entity(entity, id)
            .with_payload(payload);
        if let Err(e) = self.action_log_repo.insert(&log) {
            tracing::warn!(entity, id, error = %e, "目录变更日志写入失败");
        }
    }

    // ==========================================
    // 产品
    // ==========================================

    /// 列出产品分类
    pub fn list_categories(&self) -> Vec<CategoryOption> {
        ProductCategory::ALL
            .iter()
            .map(|c| CategoryOption {
                value: c.to_db_str().to_string(),
                category: *c,
            })
            .collect()
    }

    /// 按名称子串检索启用的产品（空查询返回空集）
    pub fn search_products(&self, query: &str) -> ApiResult<Vec<Product>> {
        Ok(self.product_repo.search_active(query)?)
    }

    /// 列出产品
    ///
    /// # 参数
    /// - include_inactive: 是否包含已停用产品
    pub fn list_products(&self, include_inactive: bool) -> ApiResult<Vec<Product>> {
        Ok(self.product_repo.list(include_inactive)?)
    }

    pub fn get_product(&self, product_id: i64) -> ApiResult<Product> {
        self.product_repo
            .find_by_id(product_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Product(id={})不存在", product_id)))
    }

    /// 新建产品
    ///
    /// # 参数
    /// - actor: 操作人
    /// - product: 产品参数
    ///
    /// # 返回
    /// - Ok(Product): 新建的产品
    /// - Err(ApiError): 名称为空、价格为负或无权限
    pub fn create_product(&self, actor: &Actor, product: &NewProduct) -> ApiResult<Product> {
        require_permission(actor, Permission::Products)?;
        if product.name.trim().is_empty() {
            return Err(ApiError::InvalidInput("产品名称不能为空".to_string()));
        }
        if product.reference_price < 0.0 {
            return Err(ApiError::InvalidInput(format!(
                "参考价格不能为负: {}",
                product.reference_price
            )));
        }
        if product.unit_of_measure.trim().is_empty() {
            return Err(ApiError::InvalidInput("计量单位不能为空".to_string()));
        }

        let id = self.product_repo.create(product)?;
        self.log_catalog_change(actor, "Product", id, json!({ "op": "create", "name": product.name }));
        info!(product_id = id, "产品已创建");
        self.get_product(id)
    }

    /// 修改产品（部分更新）
    pub fn update_product(
        &self,
        actor: &Actor,
        product_id: i64,
        update: &ProductUpdate,
    ) -> ApiResult<Product> {
        require_permission(actor, Permission::Products)?;
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(ApiError::InvalidInput("产品名称不能为空".to_string()));
            }
        }
        if matches!(update.reference_price, Some(p) if p < 0.0) {
            return Err(ApiError::InvalidInput("参考价格不能为负".to_string()));
        }

        let product = self.product_repo.update(product_id, update)?;
        self.log_catalog_change(actor, "Product", product_id, json!({ "op": "update" }));
        Ok(product)
    }

    /// 停用产品（已有批次与出库记录不受影响）
    pub fn deactivate_product(&self, actor: &Actor, product_id: i64) -> ApiResult<()> {
        require_permission(actor, Permission::Products)?;
        self.product_repo.set_active(product_id, false)?;
        self.log_catalog_change(actor, "Product", product_id, json!({ "op": "deactivate" }));
        Ok(())
    }

    // ==========================================
    // 捐赠人
    // ==========================================

    pub fn search_donors(&self, query: &str) -> ApiResult<Vec<Donor>> {
        Ok(self.donor_repo.search(query)?)
    }

    pub fn list_donors(&self) -> ApiResult<Vec<Donor>> {
        Ok(self.donor_repo.list()?)
    }

    pub fn get_donor(&self, donor_id: i64) -> ApiResult<Donor> {
        self.donor_repo
            .find_by_id(donor_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Donor(id={})不存在", donor_id)))
    }

    /// 新建捐赠人
    pub fn create_donor(&self, actor: &Actor, donor: &NewDonor) -> ApiResult<Donor> {
        require_permission(actor, Permission::Donors)?;
        if donor.name.trim().is_empty() {
            return Err(ApiError::InvalidInput("捐赠人名称不能为空".to_string()));
        }
        let id = self.donor_repo.create(donor, &actor.user_id)?;
        self.get_donor(id)
    }

    /// 按名称（不区分大小写）查找捐赠人，不存在则新建
    ///
    /// # 返回
    /// - Ok((Donor, bool)): 捐赠人及是否为新建
    pub fn find_or_create_donor(
        &self,
        actor: &Actor,
        name: &str,
        donor_type: DonorType,
    ) -> ApiResult<(Donor, bool)> {
        require_permission(actor, Permission::Donors)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidInput("捐赠人名称不能为空".to_string()));
        }
        let mut donor = NewDonor::new(name, donor_type);
        donor.is_anonymous = donor_type == DonorType::Anonymous;
        let (id, created) = self.donor_repo.find_or_create(&donor, &actor.user_id)?;
        Ok((self.get_donor(id)?, created))
    }

    // ==========================================
    // 受益方
    // ==========================================

    /// 快速新建受益方（出库向导内调用，出库权限即可）
    pub fn create_beneficiary(
        &self,
        actor: &Actor,
        beneficiary: &NewBeneficiary,
    ) -> ApiResult<Beneficiary> {
        if !actor.can(Permission::Beneficiaries) {
            require_permission(actor, Permission::Dispatch)?;
        }
        if beneficiary.name.trim().is_empty() {
            return Err(ApiError::InvalidInput("受益方名称不能为空".to_string()));
        }
        if matches!(beneficiary.estimated_population, Some(n) if n < 0) {
            return Err(ApiError::InvalidInput("预计人数不能为负".to_string()));
        }
        let id = self.beneficiary_repo.create(beneficiary)?;
        self.get_beneficiary(id)
    }

    pub fn list_beneficiaries(&self) -> ApiResult<Vec<Beneficiary>> {
        Ok(self.beneficiary_repo.list()?)
    }

    pub fn search_beneficiaries(&self, query: &str) -> ApiResult<Vec<Beneficiary>> {
        Ok(self.beneficiary_repo.search(query)?)
    }

    pub fn get_beneficiary(&self, beneficiary_id: i64) -> ApiResult<Beneficiary> {
        self.beneficiary_repo.find_by_id(beneficiary_id)?.ok_or_else(|| {
            ApiError::NotFound(format!("Beneficiary(id={})不存在", beneficiary_id))
        })
    }

    // ==========================================
    // 套装
    // ==========================================

    fn validate_kit(input: &KitInput) -> ApiResult<()> {
        if input.name.trim().is_empty() {
            return Err(ApiError::InvalidInput("套装名称不能为空".to_string()));
        }
        if input.items.is_empty() {
            return Err(ApiError::InvalidInput("套装至少需要一个产品".to_string()));
        }
        if let Some((product_id, qty)) = input.items.iter().find(|(_, q)| *q <= 0) {
            return Err(ApiError::InvalidInput(format!(
                "套装数量必须大于 0: product_id={}, cantidad={}",
                product_id, qty
            )));
        }
        Ok(())
    }

    /// 新建套装
    pub fn create_kit(&self, actor: &Actor, input: &KitInput) -> ApiResult<Kit> {
        require_permission(actor, Permission::Products)?;
        Self::validate_kit(input)?;
        let id = self.kit_repo.create(input, &actor.user_id)?;
        self.log_catalog_change(actor, "Kit", id, json!({ "op": "create", "items": input.items.len() }));
        self.get_kit(id)
    }

    /// 更新套装（模板行整体替换）
    pub fn update_kit(&self, actor: &Actor, kit_id: i64, input: &KitInput) -> ApiResult<Kit> {
        require_permission(actor, Permission::Products)?;
        Self::validate_kit(input)?;
        self.kit_repo.update(kit_id, input)?;
        self.log_catalog_change(actor, "Kit", kit_id, json!({ "op": "update", "items": input.items.len() }));
        self.get_kit(kit_id)
    }

    pub fn delete_kit(&self, actor: &Actor, kit_id: i64) -> ApiResult<()> {
        require_permission(actor, Permission::Products)?;
        self.kit_repo.delete(kit_id)?;
        self.log_catalog_change(actor, "Kit", kit_id, json!({ "op": "delete" }));
        Ok(())
    }

    pub fn list_kits(&self) -> ApiResult<Vec<Kit>> {
        Ok(self.kit_repo.list_with_items()?)
    }

    pub fn get_kit(&self, kit_id: i64) -> ApiResult<Kit> {
        self.kit_repo
            .find_by_id(kit_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Kit(id={})不存在", kit_id)))
    }
}

// ==========================================
// 物资集散中心 - 入库服务
// ==========================================
// 常规入库: 解析捐赠人 → 逐个物品调用原子的 register_product_intake
//           （批次 + 入库日志在同一事务内）
// 危机入库: 通用产品 + 可选捐赠人 + 待分拣批次 + 危机入库日志，整体一个事务
// ==========================================

use crate::db;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::lot::{Lot, NewLot};
use crate::domain::product::{NewDonor, NewProduct};
use crate::domain::triage::{BulkMeasure, NewIntakeLog, GENERIC_PRODUCT_NAME};
use crate::domain::types::{Climate, DonorType, IntakeType, LotState, ProductCategory};
use crate::domain::user::Actor;
use crate::repository::{
    ActionLogRepository, DonorRepository, IntakeRepository, LotRepository, ProductRepository,
    RepositoryError, RepositoryResult,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

// ==========================================
// 请求 / 结果
// ==========================================

/// 常规入库的捐赠人来源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DonorSelection {
    Existing { donor_id: i64 },
    New { name: String, donor_type: DonorType },
}

/// 常规入库的一个物品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeItem {
    pub product_id: i64,
    pub quantity: i64,
    /// 捐赠日期（缺省为当天）
    pub intake_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub unit_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalIntakeRequest {
    pub donor: DonorSelection,
    pub items: Vec<IntakeItem>,
}

/// 单个物品的入库结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductIntakeResult {
    pub lot: Lot,
    pub intake_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalIntakeOutcome {
    pub donor_id: i64,
    pub donor_created: bool,
    pub results: Vec<ProductIntakeResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisIntakeRequest {
    /// 可选；按名称（不区分大小写）查找或创建匿名捐赠人
    pub donor_name: Option<String>,
    pub intake_date: NaiveDate,
    pub measure: BulkMeasure,
    pub quantity: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisIntakeOutcome {
    pub lot: Lot,
    pub intake_id: i64,
    pub generic_product_id: i64,
    pub donor_id: Option<i64>,
}

// ==========================================
// IntakeService - 入库服务
// ==========================================
pub struct IntakeService {
    conn: Arc<Mutex<Connection>>,
}

impl IntakeService {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 常规入库
    ///
    /// 捐赠人解析后每个物品单独原子写入；某个物品失败时，之前的物品保留。
    #[instrument(skip(self, actor, request), fields(actor = %actor.user_id, items = request.items.len()))]
    pub fn register_normal(
        &self,
        actor: &Actor,
        request: &NormalIntakeRequest,
    ) -> RepositoryResult<NormalIntakeOutcome> {
        if request.items.is_empty() {
            return Err(RepositoryError::ValidationError("没有需要登记的物品".to_string()));
        }
        for item in &request.items {
            validate_item(item)?;
        }

        let (donor_id, donor_created) = self.resolve_donor(actor, &request.donor)?;

        let mut results = Vec::with_capacity(request.items.len());
        for item in &request.items {
            results.push(self.register_product_intake(actor, Some(donor_id), item)?);
        }

        info!(donor_id, donor_created, lots = results.len(), "常规入库完成");
        Ok(NormalIntakeOutcome {
            donor_id,
            donor_created,
            results,
        })
    }

    fn resolve_donor(
        &self,
        actor: &Actor,
        selection: &DonorSelection,
    ) -> RepositoryResult<(i64, bool)> {
        let conn = self.get_conn()?;
        match selection {
            DonorSelection::Existing { donor_id } => {
                DonorRepository::find_by_id_with(&conn, *donor_id)?
                    .ok_or_else(|| RepositoryError::not_found("Donor", donor_id))?;
                Ok((*donor_id, false))
            }
            DonorSelection::New { name, donor_type } => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(RepositoryError::ValidationError("需要指定捐赠人".to_string()));
                }
                let mut donor = NewDonor::new(name, *donor_type);
                donor.is_anonymous = false;
                let id = DonorRepository::create_with(&conn, &donor, &actor.user_id)?;
                Ok((id, true))
            }
        }
    }

    /// 原子登记一个产品入库: 新批次（disponible）+ 常规入库日志
    #[instrument(skip(self, actor, item), fields(product_id = item.product_id, quantity = item.quantity))]
    pub fn register_product_intake(
        &self,
        actor: &Actor,
        donor_id: Option<i64>,
        item: &IntakeItem,
    ) -> RepositoryResult<ProductIntakeResult> {
        validate_item(item)?;

        let conn = self.get_conn()?;
        let tx = db::begin_immediate(&conn)?;

        ProductRepository::find_by_id_with(&tx, item.product_id)?
            .ok_or_else(|| RepositoryError::not_found("Product", item.product_id))?;

        let lot = LotRepository::insert_with(
            &tx,
            &NewLot {
                product_id: item.product_id,
                donor_id,
                intake_date: item
                    .intake_date
                    .unwrap_or_else(|| chrono::Local::now().date_naive()),
                expiry_date: item.expiry_date,
                quantity: item.quantity,
                state: LotState::Available,
                notes: None,
                created_by: Some(actor.user_id.clone()),
            },
        )?;
        let intake_id = IntakeRepository::insert_with(
            &tx,
            &NewIntakeLog {
                lot_id: lot.id,
                intake_type: IntakeType::Normal,
                quantity: item.quantity,
                bulk_description: None,
                estimated_weight: None,
                triage_pending: false,
                unit_price: item.unit_price,
                recorded_by: actor.user_id.clone(),
            },
        )?;

        let log = ActionLog::new(ActionType::IntakeNormal, &actor.user_id)
            .with_entity("Lot", lot.id)
            .with_payload(json!({
                "code": lot.code,
                "product_id": item.product_id,
                "quantity": item.quantity,
                "donor_id": donor_id,
            }));
        ActionLogRepository::insert_with(&tx, &log)?;

        tx.commit()?;
        Ok(ProductIntakeResult { lot, intake_id })
    }

    /// 危机入库
    #[instrument(skip(self, actor, request), fields(actor = %actor.user_id, quantity = request.quantity))]
    pub fn register_crisis(
        &self,
        actor: &Actor,
        request: &CrisisIntakeRequest,
    ) -> RepositoryResult<CrisisIntakeOutcome> {
        if request.quantity <= 0 {
            return Err(RepositoryError::FieldValueError {
                field: "cantidad".to_string(),
                message: format!("危机入库数量必须大于 0: {}", request.quantity),
            });
        }

        let conn = self.get_conn()?;
        let tx = db::begin_immediate(&conn)?;

        // === 通用产品（缺失时创建）===
        let generic_product_id = match ProductRepository::find_by_exact_name_with(&tx, GENERIC_PRODUCT_NAME)? {
            Some(product) => product.id,
            None => {
                let mut product = NewProduct::new(GENERIC_PRODUCT_NAME, ProductCategory::Other);
                product.climate = Climate::Both;
                product.description =
                    Some("Producto genérico para ingresos masivos sin clasificar".to_string());
                ProductRepository::create_with(&tx, &product)?
            }
        };

        // === 可选捐赠人 ===
        let donor_id = match request
            .donor_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            Some(name) => {
                let donor = NewDonor::new(name, DonorType::Anonymous);
                let (id, _) = DonorRepository::find_or_create_with(&tx, &donor, &actor.user_id)?;
                Some(id)
            }
            None => None,
        };

        let lot = LotRepository::insert_with(
            &tx,
            &NewLot {
                product_id: generic_product_id,
                donor_id,
                intake_date: request.intake_date,
                expiry_date: None,
                quantity: request.quantity,
                state: LotState::PendingTriage,
                notes: request
                    .notes
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string),
                created_by: Some(actor.user_id.clone()),
            },
        )?;

        let intake_id = IntakeRepository::insert_with(
            &tx,
            &NewIntakeLog {
                lot_id: lot.id,
                intake_type: IntakeType::Crisis,
                quantity: request.quantity,
                bulk_description: Some(request.measure.describe(request.quantity)),
                estimated_weight: match request.measure {
                    BulkMeasure::Weight => Some(request.quantity as f64),
                    BulkMeasure::Bags => None,
                },
                triage_pending: true,
                unit_price: None,
                recorded_by: actor.user_id.clone(),
            },
        )?;

        let log = ActionLog::new(ActionType::IntakeCrisis, &actor.user_id)
            .with_entity("Lot", lot.id)
            .with_payload(json!({
                "code": lot.code,
                "measure": request.measure,
                "quantity": request.quantity,
                "donor_id": donor_id,
            }));
        ActionLogRepository::insert_with(&tx, &log)?;

        tx.commit()?;
        info!(code = %lot.code, "危机入库完成，批次进入待分拣队列");
        Ok(CrisisIntakeOutcome {
            lot,
            intake_id,
            generic_product_id,
            donor_id,
        })
    }
}

fn validate_item(item: &IntakeItem) -> RepositoryResult<()> {
    if item.quantity <= 0 {
        return Err(RepositoryError::FieldValueError {
            field: "cantidad".to_string(),
            message: format!("入库数量必须大于 0: {}", item.quantity),
        });
    }
    if let Some(price) = item.unit_price {
        if !price.is_finite() || price < 0.0 {
            return Err(RepositoryError::FieldValueError {
                field: "precio_unitario".to_string(),
                message: format!("单价无效: {}", price),
            });
        }
    }
    Ok(())
}

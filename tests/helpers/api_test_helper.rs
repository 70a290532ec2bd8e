// ==========================================
// API集成测试辅助工具
// ==========================================
// 职责: 提供API层集成测试的通用辅助函数
// ==========================================
#![allow(dead_code)]

#[path = "../test_helpers.rs"]
pub mod test_helpers;

pub use test_helpers::*;

use std::sync::{Arc, Mutex};
use tempfile::{NamedTempFile, TempDir};

use centro_acopio::api::{
    CatalogApi, ConfigApi, DispatchApi, IntakeApi, InventoryApi, ReportApi, TriageApi, UserApi,
};
use centro_acopio::app::AppState;
use centro_acopio::domain::beneficiary::NewBeneficiary;
use centro_acopio::domain::dispatch::{DispatchDraft, DraftLine};
use centro_acopio::domain::lot::Lot;
use centro_acopio::domain::types::{DispatchReason, LotState, TransportType, UserRole};
use centro_acopio::domain::user::Actor;
use centro_acopio::engine::LocalEvidenceStore;
use centro_acopio::repository::{ActionLogRepository, DispatchRepository, LotRepository};
use chrono::NaiveDate;
use rusqlite::Connection;

// ==========================================
// API测试环境
// ==========================================

/// API测试环境
///
/// 包含所有API实例和必要的依赖
pub struct ApiTestEnv {
    pub catalog_api: Arc<CatalogApi>,
    pub inventory_api: Arc<InventoryApi>,
    pub dispatch_api: Arc<DispatchApi>,
    pub triage_api: Arc<TriageApi>,
    pub intake_api: Arc<IntakeApi>,
    pub user_api: Arc<UserApi>,
    pub report_api: Arc<ReportApi>,
    pub config_api: Arc<ConfigApi>,

    // 独立连接（造数/断言用）
    pub conn: Arc<Mutex<Connection>>,
    pub lot_repo: LotRepository,
    pub dispatch_repo: DispatchRepository,
    pub action_log_repo: ActionLogRepository,

    pub db_path: String,
    pub evidence_dir: TempDir,
    _temp_file: NamedTempFile,
}

impl ApiTestEnv {
    /// 创建新的测试环境
    pub fn new() -> Result<Self, String> {
        let (temp_file, db_path) =
            create_test_db().map_err(|e| format!("创建测试数据库失败: {}", e))?;
        let evidence_dir = TempDir::new().map_err(|e| format!("创建凭证目录失败: {}", e))?;

        let state = AppState::with_evidence_store(
            db_path.clone(),
            Arc::new(LocalEvidenceStore::new(evidence_dir.path())),
        )?;

        let conn = open_shared_conn(&db_path);

        Ok(Self {
            catalog_api: state.catalog_api,
            inventory_api: state.inventory_api,
            dispatch_api: state.dispatch_api,
            triage_api: state.triage_api,
            intake_api: state.intake_api,
            user_api: state.user_api,
            report_api: state.report_api,
            config_api: state.config_api,
            lot_repo: LotRepository::from_connection(conn.clone()),
            dispatch_repo: DispatchRepository::from_connection(conn.clone()),
            action_log_repo: ActionLogRepository::new(conn.clone()),
            conn,
            db_path,
            evidence_dir,
            _temp_file: temp_file,
        })
    }

    // ==========================================
    // 造数
    // ==========================================

    pub fn product(&self, name: &str, price: f64) -> i64 {
        let conn = self.conn.lock().unwrap();
        insert_product(&conn, name, price)
    }

    pub fn lot(&self, product_id: i64, quantity: i64, expiry: Option<NaiveDate>) -> Lot {
        let conn = self.conn.lock().unwrap();
        insert_lot(&conn, product_id, quantity, expiry, LotState::Available)
    }

    pub fn lot_in_state(&self, product_id: i64, quantity: i64, state: LotState) -> Lot {
        let conn = self.conn.lock().unwrap();
        insert_lot(&conn, product_id, quantity, None, state)
    }

    pub fn beneficiary(&self, name: &str) -> i64 {
        self.catalog_api
            .create_beneficiary(
                &admin(),
                &NewBeneficiary {
                    name: name.to_string(),
                    province: Some("Manabí".to_string()),
                    ..Default::default()
                },
            )
            .expect("创建受益方失败")
            .id
    }

    pub fn reload_lot(&self, lot_id: i64) -> Lot {
        self.lot_repo
            .find_by_id(lot_id)
            .expect("查询批次失败")
            .expect("批次不存在")
    }

    /// 执行原始 SQL（注入触发器等）
    pub fn exec(&self, sql: &str) {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(sql).expect("执行 SQL 失败");
    }

    pub fn count(&self, table: &str) -> i64 {
        let conn = self.conn.lock().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })
        .expect("计数失败")
    }
}

// ==========================================
// 操作人
// ==========================================

pub fn admin() -> Actor {
    Actor::new("u-admin", "Admin", UserRole::Admin)
}

pub fn operator() -> Actor {
    Actor::new("u-operador", "Operadora", UserRole::Operator)
}

pub fn volunteer() -> Actor {
    Actor::new("u-voluntario", "Voluntario", UserRole::Volunteer)
}

pub fn auditor() -> Actor {
    Actor::new("u-auditor", "Auditor", UserRole::Auditor)
}

pub fn student() -> Actor {
    Actor::new("u-estudiante", "Estudiante", UserRole::Student)
}

// ==========================================
// 草稿
// ==========================================

pub fn draft_line(product_id: i64, requested: i64, real: i64) -> DraftLine {
    DraftLine {
        temp_id: uuid::Uuid::new_v4().to_string(),
        product_id,
        requested_quantity: requested,
        real_quantity: real,
    }
}

pub fn draft(beneficiary_id: i64, lines: Vec<DraftLine>) -> DispatchDraft {
    DispatchDraft {
        beneficiary_id,
        reason: DispatchReason::Flood,
        reason_detail: None,
        transport_type: TransportType::Institutional,
        transport_cost: 0.0,
        lines,
        idempotency_key: None,
    }
}

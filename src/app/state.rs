// ==========================================
// 物资集散中心 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 所有 Repository / Engine 共享同一个连接
// ==========================================

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::api::{
    CatalogApi, ConfigApi, DispatchApi, IntakeApi, InventoryApi, ReportApi, TriageApi, UserApi,
};
use crate::config::config_manager::ConfigManager;
use crate::db;
use crate::engine::{
    DispatchFinalizer, DispatchStateMachine, EvidenceStore, IntakeService, LocalEvidenceStore,
    SqliteUserProvisioner, TriageProcessor,
};
use crate::repository::{
    ActionLogRepository, BeneficiaryRepository, DiscardRepository, DispatchRepository,
    DonorRepository, IntakeRepository, KitRepository, LotRepository, ProductRepository,
    ReportRepository, UserRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 目录API（产品/捐赠人/受益方/套装）
    pub catalog_api: Arc<CatalogApi>,

    /// 库存API
    pub inventory_api: Arc<InventoryApi>,

    /// 出库API
    pub dispatch_api: Arc<DispatchApi>,

    /// 分拣API
    pub triage_api: Arc<TriageApi>,

    /// 入库API
    pub intake_api: Arc<IntakeApi>,

    /// 用户管理API
    pub user_api: Arc<UserApi>,

    /// 报表API
    pub report_api: Arc<ReportApi>,

    /// 配置管理API
    pub config_api: Arc<ConfigApi>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// 送达凭证存放在数据库同级的 `evidencias/` 目录
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        let evidence_root = Path::new(&db_path)
            .parent()
            .map(|p| p.join("evidencias"))
            .unwrap_or_else(|| PathBuf::from("evidencias"));
        Self::with_evidence_store(db_path, Arc::new(LocalEvidenceStore::new(evidence_root)))
    }

    /// 使用指定的凭证存储创建AppState
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并初始化 schema（幂等）
    /// 2. 初始化所有Repository
    /// 3. 初始化所有Engine
    /// 4. 创建所有API实例
    pub fn with_evidence_store(
        db_path: String,
        evidence_store: Arc<dyn EvidenceStore>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        db::initialize_schema(&conn).map_err(|e| format!("无法初始化数据库结构: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let product_repo = Arc::new(ProductRepository::from_connection(conn.clone()));
        let donor_repo = Arc::new(DonorRepository::from_connection(conn.clone()));
        let beneficiary_repo = Arc::new(BeneficiaryRepository::from_connection(conn.clone()));
        let kit_repo = Arc::new(KitRepository::from_connection(conn.clone()));
        let lot_repo = Arc::new(LotRepository::from_connection(conn.clone()));
        let dispatch_repo = Arc::new(DispatchRepository::from_connection(conn.clone()));
        let intake_repo = Arc::new(IntakeRepository::from_connection(conn.clone()));
        let discard_repo = Arc::new(DiscardRepository::from_connection(conn.clone()));
        let report_repo = Arc::new(ReportRepository::from_connection(conn.clone()));
        let user_repo = Arc::new(UserRepository::from_connection(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        // ==========================================
        // 初始化配置与Engine层
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let finalizer = Arc::new(DispatchFinalizer::new(conn.clone(), config_manager.clone()));
        let state_machine = Arc::new(DispatchStateMachine::new(conn.clone()));
        let triage_processor = Arc::new(TriageProcessor::new(conn.clone(), config_manager.clone()));
        let intake_service = Arc::new(IntakeService::new(conn.clone()));
        let provisioner = Arc::new(SqliteUserProvisioner::new(conn.clone()));

        // ==========================================
        // 创建API实例
        // ==========================================
        let catalog_api = Arc::new(CatalogApi::new(
            product_repo.clone(),
            donor_repo,
            beneficiary_repo,
            kit_repo.clone(),
            action_log_repo.clone(),
        ));
        let inventory_api = Arc::new(InventoryApi::new(conn.clone(), lot_repo.clone()));
        let dispatch_api = Arc::new(DispatchApi::new(
            dispatch_repo,
            product_repo,
            kit_repo,
            lot_repo,
            config_manager.clone(),
            finalizer,
            state_machine,
            evidence_store,
        ));
        let triage_api = Arc::new(TriageApi::new(
            intake_repo.clone(),
            discard_repo,
            triage_processor,
        ));
        let intake_api = Arc::new(IntakeApi::new(intake_service, intake_repo));
        let user_api = Arc::new(UserApi::new(user_repo, provisioner, action_log_repo.clone()));
        let report_api = Arc::new(ReportApi::new(report_repo));
        let config_api = Arc::new(ConfigApi::new(config_manager));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            catalog_api,
            inventory_api,
            dispatch_api,
            triage_api,
            intake_api,
            user_api,
            report_api,
            config_api,
            action_log_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先使用环境变量 CENTRO_ACOPIO_DB_PATH，否则为 `<data_dir>/centro-acopio/acopio.db`
pub fn get_default_db_path() -> String {
    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("CENTRO_ACOPIO_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./acopio.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("centro-acopio");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("acopio.db");
        }
    }

    path.to_string_lossy().to_string()
}

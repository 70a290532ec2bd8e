// ==========================================
// 目录 / 库存集成测试
// ==========================================
// 测试范围:
// 1. 产品/捐赠人检索: 子串、不区分大小写、仅启用、按名称排序、空查询
// 2. 批次新建后库存汇总即时可见
// 3. 人工报废
// 4. 并发扣减: 版本冲突可检测，不丢失更新
// ==========================================

mod helpers;

use std::sync::{Arc, Barrier};
use std::thread;

use centro_acopio::api::ApiError;
use centro_acopio::domain::kit::KitInput;
use centro_acopio::domain::product::{NewDonor, NewProduct, ProductUpdate};
use centro_acopio::domain::types::{DonorType, LotState, ProductCategory};
use centro_acopio::domain::ActionType;
use centro_acopio::repository::{LotRepository, RepositoryError};
use helpers::api_test_helper::*;

// ==========================================
// 检索
// ==========================================

#[test]
fn test_产品检索_子串不区分大小写且仅启用() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let integral = env.product("Arroz Integral", 1.8);
    let blanco = env.product("arroz blanco", 1.2);
    env.product("Aceite de girasol", 3.0);
    let retired = env.product("ARROZ viejo", 0.5);
    env.catalog_api.deactivate_product(&admin(), retired).unwrap();

    let found = env.catalog_api.search_products("ARROZ").unwrap();
    let ids: Vec<i64> = found.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![blanco, integral]);

    assert!(env.catalog_api.search_products("").unwrap().is_empty());
    assert!(env.catalog_api.search_products("   ").unwrap().is_empty());

    // 通配符按字面匹配
    assert!(env.catalog_api.search_products("%").unwrap().is_empty());

    // 带重音的大写名称同样不区分大小写
    let jabon = env.product("JABÓN LÍQUIDO", 2.5);
    let found = env.catalog_api.search_products("jabón").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, jabon);
    assert_eq!(env.catalog_api.search_products("Líquido").unwrap().len(), 1);

    // 停用产品仍可在完整列表中查到
    let all = env.catalog_api.list_products(true).unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(env.catalog_api.list_products(false).unwrap().len(), 4);
}

#[test]
fn test_捐赠人检索与查找或创建() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.catalog_api
        .create_donor(&operator(), &NewDonor::new("Cruz Roja", DonorType::Organization))
        .unwrap();
    env.catalog_api
        .create_donor(&student(), &NewDonor::new("Club Rotario", DonorType::Organization))
        .unwrap();

    let found = env.catalog_api.search_donors("ro").unwrap();
    let names: Vec<&str> = found.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["Club Rotario", "Cruz Roja"]);
    assert!(env.catalog_api.search_donors("").unwrap().is_empty());

    let (existing, created) = env
        .catalog_api
        .find_or_create_donor(&operator(), "cruz roja", DonorType::Organization)
        .unwrap();
    assert!(!created);
    assert_eq!(existing.name, "Cruz Roja");

    let (_, created) = env
        .catalog_api
        .find_or_create_donor(&operator(), "Anónimo", DonorType::Anonymous)
        .unwrap();
    assert!(created);
    assert_eq!(env.catalog_api.list_donors().unwrap().len(), 3);

    // 重音字母按 Unicode 折叠
    env.catalog_api
        .create_donor(&operator(), &NewDonor::new("FUNDACIÓN ÑANDÚ", DonorType::Organization))
        .unwrap();
    let found = env.catalog_api.search_donors("fundación ñandú").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "FUNDACIÓN ÑANDÚ");

    let (same, created) = env
        .catalog_api
        .find_or_create_donor(&operator(), "Fundación Ñandú", DonorType::Organization)
        .unwrap();
    assert!(!created);
    assert_eq!(same.id, found[0].id);
    assert_eq!(env.catalog_api.list_donors().unwrap().len(), 4);

    assert!(matches!(
        env.catalog_api
            .create_donor(&volunteer(), &NewDonor::new("X", DonorType::Individual)),
        Err(ApiError::PermissionDenied(_))
    ));
}

// ==========================================
// 产品 / 套装维护
// ==========================================

#[test]
fn test_产品维护_记录操作日志() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let mut new_product = NewProduct::new("Colchón", ProductCategory::Household);
    new_product.reference_price = 45.0;
    let product = env.catalog_api.create_product(&operator(), &new_product).unwrap();
    assert!(product.active);
    assert_eq!(product.category, ProductCategory::Household);

    let updated = env
        .catalog_api
        .update_product(
            &operator(),
            product.id,
            &ProductUpdate {
                reference_price: Some(50.0),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.reference_price, 50.0);
    assert_eq!(updated.name, "Colchón");

    let logs = env
        .action_log_repo
        .find_by_entity("Product", &product.id.to_string())
        .unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.action_type == ActionType::CatalogChange));

    let mut negative = NewProduct::new("Caro", ProductCategory::Other);
    negative.reference_price = -1.0;
    assert!(matches!(
        env.catalog_api.create_product(&operator(), &negative),
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        env.catalog_api.create_product(&student(), &new_product),
        Err(ApiError::PermissionDenied(_))
    ));
}

#[test]
fn test_套装维护() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let rice = env.product("Arroz", 1.0);
    let sugar = env.product("Azucar", 1.0);

    let kit = env
        .catalog_api
        .create_kit(
            &operator(),
            &KitInput {
                name: "Canasta básica".to_string(),
                description: Some("Para 4 personas".to_string()),
                items: vec![(rice, 2), (sugar, 1)],
            },
        )
        .unwrap();
    assert_eq!(kit.items.len(), 2);
    assert_eq!(kit.items[0].product_name, "Arroz");
    assert_eq!(kit.items[1].quantity, 1);

    assert!(matches!(
        env.catalog_api.create_kit(
            &operator(),
            &KitInput {
                name: "Vacío".to_string(),
                description: None,
                items: vec![],
            }
        ),
        Err(ApiError::InvalidInput(_))
    ));

    env.catalog_api.delete_kit(&operator(), kit.id).unwrap();
    assert!(env.catalog_api.list_kits().unwrap().is_empty());
    assert!(matches!(
        env.catalog_api.get_kit(kit.id),
        Err(ApiError::NotFound(_))
    ));
}

// ==========================================
// 库存
// ==========================================

#[test]
fn test_新批次_库存汇总即时可见() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let product = env.product("Enlatados", 2.0);
    assert_eq!(
        env.inventory_api.stock_for_product(product).unwrap().unwrap().total_stock,
        0
    );

    env.lot(product, 15, Some(days_from_today(45)));
    let stock = env.inventory_api.stock_for_product(product).unwrap().unwrap();
    assert_eq!(stock.total_stock, 15);
    assert_eq!(stock.lot_count, 1);

    env.lot(product, 5, None);
    let summary = env.inventory_api.stock_summary().unwrap();
    let row = summary.iter().find(|s| s.product_id == product).unwrap();
    assert_eq!(row.total_stock, 20);
    assert_eq!(row.lot_count, 2);
    assert_eq!(row.category, "alimentos");
}

#[test]
fn test_人工报废批次() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let product = env.product("Yogur", 0.9);
    let lot = env.lot(product, 8, Some(days_from_today(1)));

    let discarded = env
        .inventory_api
        .discard_lot(&operator(), lot.id, "Cadena de frío rota")
        .unwrap();
    assert_eq!(discarded.state, LotState::Discarded);
    assert_eq!(
        env.inventory_api.stock_for_product(product).unwrap().unwrap().total_stock,
        0
    );
    assert_eq!(env.inventory_api.lots_by_state(LotState::Discarded).unwrap().len(), 1);

    let logs = env.action_log_repo.find_by_type(ActionType::LotDiscard).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(env.count("descartes"), 1);

    // 已报废批次不可再次报废
    assert!(env
        .inventory_api
        .discard_lot(&operator(), lot.id, "otra vez")
        .is_err());
    assert!(matches!(
        env.inventory_api.discard_lot(&operator(), lot.id, " "),
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        env.inventory_api.discard_lot(&student(), lot.id, "x"),
        Err(ApiError::PermissionDenied(_))
    ));
}

// ==========================================
// 并发扣减
// ==========================================

#[test]
fn test_并发扣减_旧版本被拒绝() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let product = env.product("Pan", 0.3);
    let lot = env.lot(product, 10, None);

    let conn = env.conn.lock().unwrap();
    // 两个操作员读取到同一版本
    let first = LotRepository::decrement_with(&conn, lot.id, 3, lot.revision).unwrap();
    assert_eq!(first.current_quantity, 7);

    let err = LotRepository::decrement_with(&conn, lot.id, 4, lot.revision).unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::OptimisticLockFailure { expected: 0, actual: 1, .. }
    ));

    // 超量扣减
    let err = LotRepository::decrement_with(&conn, lot.id, 8, first.revision).unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::InsufficientStock { available: 7, requested: 8, .. }
    ));
    drop(conn);

    assert_eq!(env.reload_lot(lot.id).current_quantity, 7);
}

#[test]
fn test_并发定稿_不丢失更新() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let product = env.product("Agua", 0.5);
    let lot = env.lot(product, 100, None);
    let beneficiary = env.beneficiary("Albergue");

    let api = env.dispatch_api.clone();
    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let api = api.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..5 {
                    api.finalize(&operator(), &draft(beneficiary, vec![draft_line(product, 3, 3)]))
                        .expect("定稿失败");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let lot = env.reload_lot(lot.id);
    assert_eq!(lot.current_quantity, 100 - 4 * 5 * 3);
    assert_eq!(lot.revision, 20);
    assert_eq!(env.count("despachos"), 20);
}

#[test]
fn test_冲突错误_本地化提示() {
    let err = ApiError::from(RepositoryError::OptimisticLockFailure {
        entity: "Lot".to_string(),
        id: "12".to_string(),
        expected: 3,
        actual: 4,
    });
    assert!(matches!(err, ApiError::ConcurrentModification { .. }));
}

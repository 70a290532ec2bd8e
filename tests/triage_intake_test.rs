// ==========================================
// 入库 / 分拣集成测试
// ==========================================
// 测试范围:
// 1. 常规入库: 批次 + 入库日志原子写入，库存汇总即时可见
// 2. 危机入库: 通用产品、待分拣批次、待分拣队列
// 3. 分拣: 单次会话扣减、新批次追溯、报废记录、分拣完毕出队
// ==========================================

mod helpers;

use centro_acopio::api::ApiError;
use centro_acopio::domain::triage::{BulkMeasure, ClassifiedItem, DiscardItem, GENERIC_PRODUCT_NAME};
use centro_acopio::domain::types::{DonorType, IntakeType, LotState};
use centro_acopio::engine::{
    CrisisIntakeRequest, DonorSelection, IntakeItem, NormalIntakeRequest, TriageRequest,
};
use chrono::Local;
use helpers::api_test_helper::*;

fn crisis_request(quantity: i64, measure: BulkMeasure) -> CrisisIntakeRequest {
    CrisisIntakeRequest {
        donor_name: Some("Vecinos de Pedernales".to_string()),
        intake_date: Local::now().date_naive(),
        measure,
        quantity,
        notes: None,
    }
}

fn item(product_id: i64, quantity: i64) -> IntakeItem {
    IntakeItem {
        product_id,
        quantity,
        intake_date: None,
        expiry_date: Some(days_from_today(120)),
        unit_price: Some(1.25),
    }
}

// ==========================================
// 常规入库
// ==========================================

#[test]
fn test_常规入库_库存汇总即时可见() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let product = env.product("Arroz", 1.0);
    env.lot(product, 7, None);

    let outcome = env
        .intake_api
        .register_normal(
            &operator(),
            &NormalIntakeRequest {
                donor: DonorSelection::New {
                    name: "Supermercado La Favorita".to_string(),
                    donor_type: DonorType::Organization,
                },
                items: vec![item(product, 25)],
            },
        )
        .expect("入库失败");

    assert!(outcome.donor_created);
    assert_eq!(outcome.results.len(), 1);
    let lot = &outcome.results[0].lot;
    assert_eq!(lot.state, LotState::Available);
    assert_eq!(lot.initial_quantity, 25);
    assert_eq!(lot.current_quantity, 25);
    assert_eq!(lot.donor_id, Some(outcome.donor_id));
    assert!(lot.code.starts_with("LT-"));

    let stock = env
        .inventory_api
        .stock_for_product(product)
        .unwrap()
        .expect("缺少库存汇总");
    assert_eq!(stock.total_stock, 32);
    assert_eq!(stock.lot_count, 2);
    assert_eq!(stock.next_expiry, Some(days_from_today(120)));

    let logs = env.intake_api.list_by_lot(lot.id).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].intake_type, IntakeType::Normal);
    assert_eq!(logs[0].unit_price, Some(1.25));
    assert!(!logs[0].triage_pending);
}

#[test]
fn test_常规入库_逐项原子() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let product = env.product("Atún", 2.0);
    let donor = env
        .catalog_api
        .find_or_create_donor(&operator(), "Familia Ruiz", DonorType::Individual)
        .unwrap()
        .0;

    // 第二项产品不存在: 第一项保留
    let err = env
        .intake_api
        .register_normal(
            &operator(),
            &NormalIntakeRequest {
                donor: DonorSelection::Existing { donor_id: donor.id },
                items: vec![item(product, 5), item(4040, 5)],
            },
        )
        .expect_err("第二项应失败");
    assert!(matches!(err, ApiError::NotFound(_)));
    assert_eq!(env.lot_repo.list_by_product(product).unwrap().len(), 1);
    assert_eq!(env.count("ingresos"), 1);
}

#[test]
fn test_常规入库_校验() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let product = env.product("Atún", 2.0);
    let donor = DonorSelection::New {
        name: "Donante".to_string(),
        donor_type: DonorType::Individual,
    };

    assert!(matches!(
        env.intake_api.register_normal(
            &operator(),
            &NormalIntakeRequest {
                donor: donor.clone(),
                items: vec![],
            }
        ),
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        env.intake_api.register_normal(
            &operator(),
            &NormalIntakeRequest {
                donor: donor.clone(),
                items: vec![item(product, 0)],
            }
        ),
        Err(ApiError::InvalidInput(_))
    ));
    // 志愿者只能做危机入库
    assert!(matches!(
        env.intake_api.register_normal(
            &volunteer(),
            &NormalIntakeRequest {
                donor,
                items: vec![item(product, 1)],
            }
        ),
        Err(ApiError::PermissionDenied(_))
    ));
    assert_eq!(env.count("lotes"), 0);
}

// ==========================================
// 危机入库
// ==========================================

#[test]
fn test_危机入库_进入待分拣队列() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");

    let bags = env
        .intake_api
        .register_crisis(&volunteer(), &crisis_request(12, BulkMeasure::Bags))
        .expect("危机入库失败");
    let weight = env
        .intake_api
        .register_crisis(&volunteer(), &crisis_request(80, BulkMeasure::Weight))
        .expect("危机入库失败");

    assert_eq!(bags.lot.state, LotState::PendingTriage);
    assert_eq!(bags.lot.expiry_date, None);
    // 通用产品与捐赠人只创建一次
    assert_eq!(bags.generic_product_id, weight.generic_product_id);
    assert_eq!(bags.donor_id, weight.donor_id);
    let generic = env.catalog_api.get_product(bags.generic_product_id).unwrap();
    assert_eq!(generic.name, GENERIC_PRODUCT_NAME);
    let donor = env.catalog_api.get_donor(bags.donor_id.unwrap()).unwrap();
    assert!(donor.is_anonymous);

    let pending = env.triage_api.list_pending().unwrap();
    assert_eq!(pending.len(), 2);
    let by_lot = |id: i64| pending.iter().find(|p| p.lot_id == id).unwrap();
    assert_eq!(
        by_lot(bags.lot.id).bulk_description.as_deref(),
        Some("Ingreso por Bultos (12)")
    );
    assert_eq!(by_lot(bags.lot.id).estimated_weight, None);
    assert_eq!(
        by_lot(weight.lot.id).bulk_description.as_deref(),
        Some("Ingreso por Peso (80kg)")
    );
    assert_eq!(by_lot(weight.lot.id).estimated_weight, Some(80.0));

    // 待分拣批次不计入可用库存
    let stock = env
        .inventory_api
        .stock_for_product(bags.generic_product_id)
        .unwrap()
        .unwrap();
    assert_eq!(stock.total_stock, 0);
}

#[test]
fn test_危机入库_数量无效() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    assert!(matches!(
        env.intake_api
            .register_crisis(&volunteer(), &crisis_request(0, BulkMeasure::Bags)),
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        env.intake_api
            .register_crisis(&auditor(), &crisis_request(3, BulkMeasure::Bags)),
        Err(ApiError::PermissionDenied(_))
    ));
}

// ==========================================
// 分拣
// ==========================================

#[test]
fn test_分拣_单次会话扣减一个单位() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let rice = env.product("Arroz", 1.0);
    let shirts = env.product("Camisetas", 3.0);
    let source = env
        .intake_api
        .register_crisis(&volunteer(), &crisis_request(5, BulkMeasure::Bags))
        .unwrap()
        .lot;

    let outcome = env
        .triage_api
        .process(
            &volunteer(),
            &TriageRequest {
                source_lot_id: source.id,
                classified: vec![
                    ClassifiedItem {
                        product_id: rice,
                        quantity: 12,
                        expiry_date: Some(days_from_today(200)),
                        notes: None,
                    },
                    ClassifiedItem {
                        product_id: shirts,
                        quantity: 30,
                        expiry_date: None,
                        notes: Some("talla M".to_string()),
                    },
                ],
                discards: vec![DiscardItem {
                    description: "Ropa mojada".to_string(),
                    quantity: 4,
                    discard_reason: "Humedad".to_string(),
                    product_id: None,
                }],
                idempotency_key: None,
            },
        )
        .expect("分拣失败");

    assert_eq!(outcome.decremented_by, 1);
    assert_eq!(outcome.source_remaining, 4);
    assert_eq!(outcome.source_state, LotState::PendingTriage);
    let source_after = env.reload_lot(source.id);
    assert_eq!(source_after.current_quantity, 4);
    assert_eq!(source_after.state, LotState::PendingTriage);

    // 仍在待分拣队列中
    let pending = env.triage_api.list_pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].current_quantity, 4);

    // 新批次可追溯到源批次
    assert_eq!(outcome.created_lot_ids.len(), 2);
    let shirts_lot = env.reload_lot(outcome.created_lot_ids[1]);
    assert_eq!(shirts_lot.state, LotState::Available);
    assert_eq!(shirts_lot.current_quantity, 30);
    assert_eq!(shirts_lot.donor_id, source.donor_id);
    assert_eq!(
        shirts_lot.notes,
        Some(format!("Clasificado desde bulto {} - talla M", source.code))
    );
    let derived = env.intake_api.list_by_lot(shirts_lot.id).unwrap();
    assert_eq!(
        derived[0].bulk_description,
        Some(format!("Derivado de Triaje {}", source.code))
    );
    assert!(!derived[0].triage_pending);

    let discards = env.triage_api.discards_for_lot(source.id).unwrap();
    assert_eq!(discards.len(), 1);
    assert_eq!(discards[0].quantity, 4);
    assert_eq!(discards[0].recorded_by, volunteer().user_id);

    assert_eq!(
        env.inventory_api.stock_for_product(rice).unwrap().unwrap().total_stock,
        12
    );
}

#[test]
fn test_分拣_最后一袋_批次出队() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let rice = env.product("Arroz", 1.0);
    let source = env
        .intake_api
        .register_crisis(&volunteer(), &crisis_request(1, BulkMeasure::Bags))
        .unwrap()
        .lot;

    let outcome = env
        .triage_api
        .process(
            &volunteer(),
            &TriageRequest {
                source_lot_id: source.id,
                classified: vec![ClassifiedItem {
                    product_id: rice,
                    quantity: 3,
                    expiry_date: None,
                    notes: None,
                }],
                discards: vec![],
                idempotency_key: None,
            },
        )
        .unwrap();

    assert_eq!(outcome.source_remaining, 0);
    assert_eq!(outcome.source_state, LotState::Exhausted);
    assert_eq!(env.reload_lot(source.id).state, LotState::Exhausted);
    assert!(env.triage_api.list_pending().unwrap().is_empty());

    // 已分拣完毕的批次不可再分拣
    let err = env
        .triage_api
        .process(
            &volunteer(),
            &TriageRequest {
                source_lot_id: source.id,
                classified: vec![ClassifiedItem {
                    product_id: rice,
                    quantity: 1,
                    expiry_date: None,
                    notes: None,
                }],
                discards: vec![],
                idempotency_key: None,
            },
        )
        .expect_err("源批次已分拣完毕");
    assert!(matches!(err, ApiError::InvalidStateTransition { .. }));
}

#[test]
fn test_分拣_按处理总量扣减() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.config_api
        .update_config(&admin(), "triage.decrement_policy", "processed_total")
        .unwrap();
    let rice = env.product("Arroz", 1.0);
    let source = env
        .intake_api
        .register_crisis(&volunteer(), &crisis_request(50, BulkMeasure::Weight))
        .unwrap()
        .lot;

    let outcome = env
        .triage_api
        .process(
            &volunteer(),
            &TriageRequest {
                source_lot_id: source.id,
                classified: vec![ClassifiedItem {
                    product_id: rice,
                    quantity: 20,
                    expiry_date: None,
                    notes: None,
                }],
                discards: vec![DiscardItem {
                    description: "Arroz con gorgojo".to_string(),
                    quantity: 5,
                    discard_reason: "Plaga".to_string(),
                    product_id: Some(rice),
                }],
                idempotency_key: None,
            },
        )
        .unwrap();
    assert_eq!(outcome.decremented_by, 25);
    assert_eq!(env.reload_lot(source.id).current_quantity, 25);
}

#[test]
fn test_分拣_未知产品_不写入() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let source = env
        .intake_api
        .register_crisis(&volunteer(), &crisis_request(5, BulkMeasure::Bags))
        .unwrap()
        .lot;
    let lots_before = env.count("lotes");

    let err = env
        .triage_api
        .process(
            &volunteer(),
            &TriageRequest {
                source_lot_id: source.id,
                classified: vec![ClassifiedItem {
                    product_id: 31337,
                    quantity: 2,
                    expiry_date: None,
                    notes: None,
                }],
                discards: vec![DiscardItem {
                    description: "Cartón".to_string(),
                    quantity: 1,
                    discard_reason: "Basura".to_string(),
                    product_id: None,
                }],
                idempotency_key: None,
            },
        )
        .expect_err("产品不存在");
    assert!(matches!(err, ApiError::NotFound(_)));
    assert_eq!(env.count("lotes"), lots_before);
    assert_eq!(env.count("descartes"), 0);
    assert_eq!(env.reload_lot(source.id).current_quantity, 5);

    // 源批次不存在
    assert!(matches!(
        env.triage_api.process(
            &volunteer(),
            &TriageRequest {
                source_lot_id: 999,
                classified: vec![],
                discards: vec![DiscardItem {
                    description: "x".to_string(),
                    quantity: 1,
                    discard_reason: "y".to_string(),
                    product_id: None,
                }],
                idempotency_key: None,
            }
        ),
        Err(ApiError::NotFound(_))
    ));
}

#[test]
fn test_分拣_幂等键与权限() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let rice = env.product("Arroz", 1.0);
    let source = env
        .intake_api
        .register_crisis(&volunteer(), &crisis_request(5, BulkMeasure::Bags))
        .unwrap()
        .lot;
    let request = TriageRequest {
        source_lot_id: source.id,
        classified: vec![ClassifiedItem {
            product_id: rice,
            quantity: 2,
            expiry_date: None,
            notes: None,
        }],
        discards: vec![],
        idempotency_key: Some("triage-session-1".to_string()),
    };

    // 操作员没有分拣权限
    assert!(matches!(
        env.triage_api.process(&operator(), &request),
        Err(ApiError::PermissionDenied(_))
    ));

    let first = env.triage_api.process(&volunteer(), &request).unwrap();
    let second = env.triage_api.process(&volunteer(), &request).unwrap();
    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.created_lot_ids, second.created_lot_ids);
    assert_eq!(env.reload_lot(source.id).current_quantity, 4);

    // 空会话被拒绝
    let empty = TriageRequest {
        source_lot_id: source.id,
        classified: vec![],
        discards: vec![],
        idempotency_key: None,
    };
    assert!(matches!(
        env.triage_api.process(&volunteer(), &empty),
        Err(ApiError::InvalidInput(_))
    ));
}

// ==========================================
// 出库状态机 / 出库向导集成测试
// ==========================================
// 测试范围:
// 1. 定稿后的人工状态变更与终态保护
// 2. completado 需要送达凭证（上传后写入 URL）
// 3. 向导: 套装展开、库存封顶开关、草稿生成
// ==========================================

mod helpers;

use centro_acopio::api::ApiError;
use centro_acopio::domain::kit::KitInput;
use centro_acopio::domain::types::{DispatchReason, DispatchState, TransportType};
use centro_acopio::domain::ActionType;
use centro_acopio::engine::{TransitionRequest, WizardStep};
use helpers::api_test_helper::*;

/// 造一张已定稿的出库单，返回 id
fn finalized_dispatch(env: &ApiTestEnv) -> i64 {
    let product = env.product("Kit higiene", 5.0);
    env.lot(product, 10, None);
    let beneficiary = env.beneficiary("Albergue");
    env.dispatch_api
        .finalize(&operator(), &draft(beneficiary, vec![draft_line(product, 2, 2)]))
        .expect("定稿失败")
        .dispatch
        .id
}

// ==========================================
// 状态变更
// ==========================================

#[test]
fn test_状态变更_validado_记录验证人() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let id = finalized_dispatch(&env);

    let validated = env
        .dispatch_api
        .transition(&admin(), id, DispatchState::Validated, &TransitionRequest::default())
        .expect("变更失败");
    assert_eq!(validated.state, DispatchState::Validated);
    assert_eq!(validated.validated_by.as_deref(), Some("u-admin"));
    assert!(validated.validated_at.is_some());

    let en_route = env
        .dispatch_api
        .transition(&operator(), id, DispatchState::EnRoute, &TransitionRequest::default())
        .expect("变更失败");
    assert_eq!(en_route.state, DispatchState::EnRoute);
    assert!(en_route.revision > validated.revision);

    let logs = env
        .action_log_repo
        .find_by_entity("Dispatch", &id.to_string())
        .unwrap();
    let changes = logs
        .iter()
        .filter(|l| l.action_type == ActionType::DispatchStateChange)
        .count();
    assert_eq!(changes, 2);
}

#[test]
fn test_状态变更_rectificado_写入说明() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let id = finalized_dispatch(&env);

    let rectified = env
        .dispatch_api
        .transition(
            &operator(),
            id,
            DispatchState::Rectified,
            &TransitionRequest {
                evidence_url: None,
                notes: Some("Se devolvieron 2 cajas".to_string()),
            },
        )
        .expect("变更失败");
    assert!(rectified.was_rectified);
    assert_eq!(
        rectified.rectification_notes.as_deref(),
        Some("Se devolvieron 2 cajas")
    );
}

#[test]
fn test_状态变更_终态不可迁出() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let id = finalized_dispatch(&env);

    env.dispatch_api
        .transition(&operator(), id, DispatchState::Cancelled, &TransitionRequest::default())
        .expect("取消失败");

    let err = env
        .dispatch_api
        .transition(&operator(), id, DispatchState::EnRoute, &TransitionRequest::default())
        .expect_err("终态不可迁出");
    assert!(matches!(
        err,
        ApiError::InvalidStateTransition { ref from, ref to } if from == "cancelado" && to == "en_camino"
    ));
}

#[test]
fn test_状态变更_非法目标() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let id = finalized_dispatch(&env);

    // 原地迁移
    assert!(matches!(
        env.dispatch_api.transition(
            &operator(),
            id,
            DispatchState::Dispatched,
            &TransitionRequest::default()
        ),
        Err(ApiError::InvalidStateTransition { .. })
    ));
    // preparando 不可作为目标
    assert!(matches!(
        env.dispatch_api.transition(
            &operator(),
            id,
            DispatchState::Preparing,
            &TransitionRequest::default()
        ),
        Err(ApiError::InvalidStateTransition { .. })
    ));
    // 不存在
    assert!(matches!(
        env.dispatch_api.transition(
            &operator(),
            404,
            DispatchState::Validated,
            &TransitionRequest::default()
        ),
        Err(ApiError::NotFound(_))
    ));
    // 无权限
    assert!(matches!(
        env.dispatch_api.transition(
            &auditor(),
            id,
            DispatchState::Validated,
            &TransitionRequest::default()
        ),
        Err(ApiError::PermissionDenied(_))
    ));
}

#[test]
fn test_completado_缺少凭证被拒绝() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let id = finalized_dispatch(&env);

    let err = env
        .dispatch_api
        .transition(&operator(), id, DispatchState::Completed, &TransitionRequest::default())
        .expect_err("缺少凭证");
    assert!(matches!(err, ApiError::ValidationError(_)));
    assert_eq!(
        env.dispatch_api.get_dispatch(id).unwrap().state,
        DispatchState::Dispatched
    );
}

#[tokio::test]
async fn test_上传凭证后完成出库() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let id = finalized_dispatch(&env);

    let completed = env
        .dispatch_api
        .complete_with_evidence(&operator(), id, "entrega.JPG", b"\xFF\xD8\xFFfake-jpeg", None)
        .await
        .expect("完成失败");

    assert_eq!(completed.state, DispatchState::Completed);
    assert!(completed.delivered_at.is_some());
    let url = completed.evidence_url.expect("缺少凭证 URL");
    assert!(url.starts_with("file://"));
    assert!(url.ends_with(".jpg"));

    let stored: Vec<_> = std::fs::read_dir(env.evidence_dir.path())
        .unwrap()
        .collect();
    assert_eq!(stored.len(), 1);

    // 已完成的出库单不再上传
    let err = env
        .dispatch_api
        .complete_with_evidence(&operator(), id, "otra.png", b"png", None)
        .await
        .expect_err("终态");
    assert!(matches!(err, ApiError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn test_上传失败_状态不变() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let id = finalized_dispatch(&env);

    let err = env
        .dispatch_api
        .complete_with_evidence(&operator(), id, "entrega.pdf", b"%PDF", None)
        .await
        .expect_err("非图片");
    assert!(matches!(err, ApiError::StorageError(_)));
    assert_eq!(
        env.dispatch_api.get_dispatch(id).unwrap().state,
        DispatchState::Dispatched
    );
}

// ==========================================
// 向导
// ==========================================

#[test]
fn test_向导_套装展开并生成草稿() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let rice = env.product("Arroz", 1.0);
    let oil = env.product("Aceite", 3.0);
    env.lot(rice, 100, Some(days_from_today(30)));
    env.lot(oil, 100, Some(days_from_today(30)));
    let beneficiary = env.beneficiary("Familia Pérez");

    let kit = env
        .catalog_api
        .create_kit(
            &admin(),
            &KitInput {
                name: "Kit familiar".to_string(),
                description: None,
                items: vec![(rice, 5), (oil, 2)],
            },
        )
        .expect("创建套装失败");

    let mut wizard = env.dispatch_api.new_wizard(&operator()).expect("创建向导失败");
    wizard
        .select_beneficiary(beneficiary, DispatchReason::Earthquake, None)
        .unwrap();
    assert_eq!(wizard.advance().unwrap(), WizardStep::ItemSelection);

    let ids = env
        .dispatch_api
        .add_kit_to_wizard(&mut wizard, kit.id)
        .expect("加入套装失败");
    assert_eq!(ids.len(), 2);
    env.dispatch_api
        .add_product_to_wizard(&mut wizard, rice, 3)
        .expect("加入产品失败");
    assert_eq!(wizard.lines().len(), 3);

    // 套装模板修改不影响已加入的行
    env.catalog_api
        .update_kit(
            &admin(),
            kit.id,
            &KitInput {
                name: "Kit familiar".to_string(),
                description: None,
                items: vec![(rice, 50)],
            },
        )
        .unwrap();
    assert_eq!(wizard.lines()[0].quantity, 5);

    wizard.advance().unwrap();
    wizard.select_transport(TransportType::External, 12.0).unwrap();
    // 5*1 + 2*3 + 3*1 + 12
    assert_eq!(wizard.estimated_total(), 26.0);
    wizard.advance().unwrap();
    wizard.set_real_quantity(&ids[1], 1).unwrap();

    let d = wizard.build_draft(None).unwrap();
    let outcome = env.dispatch_api.finalize(&operator(), &d).expect("定稿失败");
    assert_eq!(outcome.line_count, 3);
    assert_eq!(outcome.shortage_count, 1);
    assert_eq!(outcome.dispatch.transport_cost, 12.0);
}

#[test]
fn test_向导_库存封顶开关() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let product = env.product("Mascarillas", 0.2);
    env.lot(product, 5, None);

    // 默认不封顶
    let mut wizard = env.dispatch_api.new_wizard(&operator()).unwrap();
    wizard.select_beneficiary(1, DispatchReason::Pandemic, None).unwrap();
    wizard.advance().unwrap();
    assert!(env.dispatch_api.add_product_to_wizard(&mut wizard, product, 50).is_ok());

    env.config_api
        .update_config(&admin(), "dispatch.cap_to_stock", "true")
        .unwrap();
    let mut capped = env.dispatch_api.new_wizard(&operator()).unwrap();
    capped.select_beneficiary(1, DispatchReason::Pandemic, None).unwrap();
    capped.advance().unwrap();
    assert!(env.dispatch_api.add_product_to_wizard(&mut capped, product, 5).is_ok());
    let err = env
        .dispatch_api
        .add_product_to_wizard(&mut capped, product, 1)
        .expect_err("超出库存");
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

#[test]
fn test_向导_套装受库存封顶约束() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let water = env.product("Agua", 0.5);
    let tuna = env.product("Atún", 2.0);
    env.lot(water, 10, None);
    env.lot(tuna, 2, None);
    env.config_api
        .update_config(&admin(), "dispatch.cap_to_stock", "true")
        .unwrap();

    let big = env
        .catalog_api
        .create_kit(
            &admin(),
            &KitInput {
                name: "Kit grande".to_string(),
                description: None,
                items: vec![(water, 4), (tuna, 3)],
            },
        )
        .unwrap();
    let mut wizard = env.dispatch_api.new_wizard(&operator()).unwrap();
    wizard.select_beneficiary(1, DispatchReason::Flood, None).unwrap();
    wizard.advance().unwrap();

    // 第二行超出库存，整个套装都不加入
    let err = env
        .dispatch_api
        .add_kit_to_wizard(&mut wizard, big.id)
        .expect_err("超出库存");
    assert!(matches!(err, ApiError::InvalidInput(_)));
    assert!(wizard.lines().is_empty());

    let small = env
        .catalog_api
        .create_kit(
            &admin(),
            &KitInput {
                name: "Kit pequeño".to_string(),
                description: None,
                items: vec![(water, 4), (tuna, 2)],
            },
        )
        .unwrap();
    assert_eq!(
        env.dispatch_api
            .add_kit_to_wizard(&mut wizard, small.id)
            .unwrap()
            .len(),
        2
    );
    // 购物车中已有的数量计入上限
    assert!(env.dispatch_api.add_kit_to_wizard(&mut wizard, small.id).is_err());
    assert_eq!(wizard.lines().len(), 2);

    // 停用产品的套装不可加入
    env.catalog_api.deactivate_product(&admin(), water).unwrap();
    let mut fresh = env.dispatch_api.new_wizard(&operator()).unwrap();
    fresh.select_beneficiary(1, DispatchReason::Flood, None).unwrap();
    fresh.advance().unwrap();
    assert!(matches!(
        env.dispatch_api.add_kit_to_wizard(&mut fresh, small.id),
        Err(ApiError::InvalidInput(_))
    ));
}

#[test]
fn test_向导_未知产品与无权限() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    assert!(matches!(
        env.dispatch_api.new_wizard(&auditor()),
        Err(ApiError::PermissionDenied(_))
    ));

    let mut wizard = env.dispatch_api.new_wizard(&student()).unwrap();
    wizard.select_beneficiary(1, DispatchReason::Flood, None).unwrap();
    wizard.advance().unwrap();
    assert!(matches!(
        env.dispatch_api.add_product_to_wizard(&mut wizard, 777, 1),
        Err(ApiError::NotFound(_))
    ));
}

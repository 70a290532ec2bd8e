// ==========================================
// 物资集散中心 - 命令行入口
// ==========================================
// 用法:
//   centro-acopio                                   初始化数据库并输出概况
//   centro-acopio bootstrap-admin <email> <nombre> [password]
//                                                    开通首个管理员账号
// 环境变量: CENTRO_ACOPIO_DB_PATH, RUST_LOG, CENTRO_ACOPIO_LOG_JSON
// ==========================================

use std::error::Error;

use centro_acopio::app::{get_default_db_path, AppState};
use centro_acopio::domain::types::UserRole;
use centro_acopio::domain::user::{Actor, ProvisionRequest};

fn main() -> Result<(), Box<dyn Error>> {
    if std::env::var("CENTRO_ACOPIO_LOG_JSON").is_ok() {
        centro_acopio::logging::init_json();
    } else {
        centro_acopio::logging::init();
    }

    tracing::info!("==================================================");
    tracing::info!("{} v{}", centro_acopio::APP_NAME, centro_acopio::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);
    let state = AppState::new(db_path)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("bootstrap-admin") => bootstrap_admin(&state, &args[1..]),
        Some(other) => Err(format!("未知命令: {}", other).into()),
        None => print_overview(&state),
    }
}

/// 开通首个管理员（仅当尚无任何账号时允许）
fn bootstrap_admin(state: &AppState, args: &[String]) -> Result<(), Box<dyn Error>> {
    let (email, name) = match args {
        [email, name, ..] => (email.clone(), name.clone()),
        _ => return Err("用法: bootstrap-admin <email> <nombre> [password]".into()),
    };

    let system = Actor::new("system", "Sistema", UserRole::Admin);
    if !state.user_api.list_users(&system)?.is_empty() {
        return Err("已存在账号，请使用管理员身份开通新账号".into());
    }

    let profile = state.user_api.provision(
        &system,
        &ProvisionRequest {
            email,
            password: args.get(2).cloned(),
            name,
            role: UserRole::Admin,
            active_until: None,
        },
    )?;
    println!("管理员已开通: {} <{}>", profile.name, profile.email);
    Ok(())
}

fn print_overview(state: &AppState) -> Result<(), Box<dyn Error>> {
    let stats = state.report_api.dashboard_stats()?;
    let pending = state.triage_api.list_pending()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    println!("待分拣: {}", pending.len());
    Ok(())
}

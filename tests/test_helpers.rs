// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================
#![allow(dead_code)]

use centro_acopio::db;
use centro_acopio::domain::lot::{Lot, NewLot};
use centro_acopio::domain::product::NewProduct;
use centro_acopio::domain::types::{LotState, ProductCategory};
use centro_acopio::repository::{LotRepository, ProductRepository};
use chrono::{Duration, Local, NaiveDate};
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().ok_or("临时路径非 UTF-8")?.to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::initialize_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接（统一 PRAGMA）
pub fn open_shared_conn(db_path: &str) -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(db::open_sqlite_connection(db_path).unwrap()))
}

/// 今天起偏移若干天的日期
pub fn days_from_today(days: i64) -> NaiveDate {
    Local::now().date_naive() + Duration::days(days)
}

/// 插入启用产品，返回 id
pub fn insert_product(conn: &Connection, name: &str, price: f64) -> i64 {
    let mut product = NewProduct::new(name, ProductCategory::Food);
    product.reference_price = price;
    ProductRepository::create_with(conn, &product).unwrap()
}

/// 插入批次
pub fn insert_lot(
    conn: &Connection,
    product_id: i64,
    quantity: i64,
    expiry_date: Option<NaiveDate>,
    state: LotState,
) -> Lot {
    LotRepository::insert_with(
        conn,
        &NewLot {
            product_id,
            donor_id: None,
            intake_date: Local::now().date_naive(),
            expiry_date,
            quantity,
            state,
            notes: None,
            created_by: Some("seed".to_string()),
        },
    )
    .unwrap()
}

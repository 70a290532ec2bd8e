// ==========================================
// 物资集散中心 - 产品目录仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 产品只停用，不物理删除
// ==========================================

use crate::domain::product::{NewProduct, Product, ProductUpdate};
use crate::domain::types::{Climate, ProductCategory};
use crate::repository::db_utils::{contains_pattern, get_enum, get_ts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

/// 搜索结果上限
pub const PRODUCT_SEARCH_LIMIT: usize = 20;

const PRODUCT_COLUMNS: &str = "id, nombre, categoria, clima, unidad_medida, precio_referencial, \
                               descripcion, activo, created_at";

// ==========================================
// ProductRepository - 产品仓储
// ==========================================
pub struct ProductRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<Product> {
        Ok(Product {
            id: row.get(0)?,
            name: row.get(1)?,
            category: get_enum(row, 2, ProductCategory::from_db_str)?,
            climate: get_enum(row, 3, Climate::from_db_str)?,
            unit_of_measure: row.get(4)?,
            reference_price: row.get(5)?,
            description: row.get(6)?,
            active: row.get::<_, i64>(7)? != 0,
            created_at: get_ts(row, 8)?,
        })
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 新建产品，返回新 id
    pub fn create(&self, product: &NewProduct) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::create_with(&conn, product)
    }

    /// 在给定连接（或事务）上新建产品
    pub fn create_with(conn: &Connection, product: &NewProduct) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO productos (
                nombre, categoria, clima, unidad_medida, precio_referencial, descripcion, activo
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)
            "#,
            params![
                product.name.trim(),
                product.category.to_db_str(),
                product.climate.to_db_str(),
                product.unit_of_measure,
                product.reference_price,
                product.description,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 部分更新产品
    pub fn update(&self, id: i64, update: &ProductUpdate) -> RepositoryResult<Product> {
        let conn = self.get_conn()?;
        let current = Self::find_by_id_with(&conn, id)?
            .ok_or_else(|| RepositoryError::not_found("Product", id))?;

        let name = update.name.clone().unwrap_or(current.name);
        let category = update.category.unwrap_or(current.category);
        let climate = update.climate.unwrap_or(current.climate);
        let unit = update
            .unit_of_measure
            .clone()
            .unwrap_or(current.unit_of_measure);
        let price = update.reference_price.unwrap_or(current.reference_price);
        let description = update.description.clone().unwrap_or(current.description);
        let active = update.active.unwrap_or(current.active);

        conn.execute(
            r#"
            UPDATE productos
               SET nombre = ?1, categoria = ?2, clima = ?3, unidad_medida = ?4,
                   precio_referencial = ?5, descripcion = ?6, activo = ?7
             WHERE id = ?8
            "#,
            params![
                name.trim(),
                category.to_db_str(),
                climate.to_db_str(),
                unit,
                price,
                description,
                active as i64,
                id,
            ],
        )?;

        Self::find_by_id_with(&conn, id)?.ok_or_else(|| RepositoryError::not_found("Product", id))
    }

    /// 设置启用标志
    pub fn set_active(&self, id: i64, active: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE productos SET activo = ?1 WHERE id = ?2",
            params![active as i64, id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Product", id));
        }
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 id 查询
    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        Self::find_by_id_with(&conn, id)
    }

    pub fn find_by_id_with(conn: &Connection, id: i64) -> RepositoryResult<Option<Product>> {
        let sql = format!("SELECT {} FROM productos WHERE id = ?1", PRODUCT_COLUMNS);
        let product = conn
            .query_row(&sql, params![id], Self::map_row)
            .optional()?;
        Ok(product)
    }

    /// 按精确名称查找（危机入库的通用产品）
    pub fn find_by_exact_name_with(
        conn: &Connection,
        name: &str,
    ) -> RepositoryResult<Option<Product>> {
        let sql = format!(
            "SELECT {} FROM productos WHERE nombre = ?1 ORDER BY id LIMIT 1",
            PRODUCT_COLUMNS
        );
        let product = conn
            .query_row(&sql, params![name], Self::map_row)
            .optional()?;
        Ok(product)
    }

    /// 按名称子串搜索启用产品（不区分大小写，按名称排序）
    ///
    /// 空查询直接返回空集，不访问数据库
    pub fn search_active(&self, query: &str) -> RepositoryResult<Vec<Product>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM productos
             WHERE activo = 1 AND fold(nombre) LIKE fold(?1) ESCAPE '\'
             ORDER BY fold(nombre), id
             LIMIT ?2
            "#,
            PRODUCT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let products = stmt
            .query_map(
                params![contains_pattern(query), PRODUCT_SEARCH_LIMIT as i64],
                Self::map_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(products)
    }

    /// 列出产品
    pub fn list(&self, include_inactive: bool) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM productos WHERE (?1 = 1 OR activo = 1) ORDER BY nombre COLLATE NOCASE, id",
            PRODUCT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let products = stmt
            .query_map(params![include_inactive as i64], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(products)
    }
}

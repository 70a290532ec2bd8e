// ==========================================
// 物资集散中心 - 套装模板仓储
// ==========================================
// 模板行整体替换（事务内先删后插）
// ==========================================

use crate::domain::kit::{Kit, KitInput, KitItem};
use crate::repository::db_utils::get_ts;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct KitRepository {
    conn: Arc<Mutex<Connection>>,
}

impl KitRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn insert_items(conn: &Connection, kit_id: i64, items: &[(i64, i64)]) -> RepositoryResult<()> {
        let mut stmt = conn.prepare(
            "INSERT INTO items_kit (kit_id, producto_id, cantidad, orden) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (orden, (product_id, quantity)) in items.iter().enumerate() {
            stmt.execute(params![kit_id, product_id, quantity, orden as i64])?;
        }
        Ok(())
    }

    /// 新建套装（模板头 + 模板行）
    pub fn create(&self, input: &KitInput, created_by: &str) -> RepositoryResult<i64> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO kits (nombre, descripcion, created_by) VALUES (?1, ?2, ?3)",
            params![input.name.trim(), input.description, created_by],
        )?;
        let kit_id = tx.last_insert_rowid();
        Self::insert_items(&tx, kit_id, &input.items)?;

        tx.commit()?;
        Ok(kit_id)
    }

    /// 更新套装，模板行整体替换
    pub fn update(&self, kit_id: i64, input: &KitInput) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE kits SET nombre = ?1, descripcion = ?2 WHERE id = ?3",
            params![input.name.trim(), input.description, kit_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Kit", kit_id));
        }
        tx.execute("DELETE FROM items_kit WHERE kit_id = ?1", params![kit_id])?;
        Self::insert_items(&tx, kit_id, &input.items)?;

        tx.commit()?;
        Ok(())
    }

    /// 删除套装（模板行级联删除）
    pub fn delete(&self, kit_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute("DELETE FROM kits WHERE id = ?1", params![kit_id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Kit", kit_id));
        }
        Ok(())
    }

    /// 按 id 查询（含模板行）
    pub fn find_by_id(&self, kit_id: i64) -> RepositoryResult<Option<Kit>> {
        let conn = self.get_conn()?;
        let kit = conn
            .query_row(
                "SELECT id, nombre, descripcion, created_at, created_by FROM kits WHERE id = ?1",
                params![kit_id],
                |row| {
                    Ok(Kit {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        created_at: get_ts(row, 3)?,
                        created_by: row.get(4)?,
                        items: Vec::new(),
                    })
                },
            )
            .optional()?;

        match kit {
            Some(mut kit) => {
                let mut items = Self::load_items(&conn)?;
                kit.items = items.remove(&kit.id).unwrap_or_default();
                Ok(Some(kit))
            }
            None => Ok(None),
        }
    }

    /// 列出全部套装（含模板行）
    pub fn list_with_items(&self) -> RepositoryResult<Vec<Kit>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, nombre, descripcion, created_at, created_by FROM kits ORDER BY nombre COLLATE NOCASE, id",
        )?;
        let mut kits = stmt
            .query_map([], |row| {
                Ok(Kit {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    created_at: get_ts(row, 3)?,
                    created_by: row.get(4)?,
                    items: Vec::new(),
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut items = Self::load_items(&conn)?;
        for kit in kits.iter_mut() {
            kit.items = items.remove(&kit.id).unwrap_or_default();
        }
        Ok(kits)
    }

    fn load_items(conn: &Connection) -> RepositoryResult<HashMap<i64, Vec<KitItem>>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT ik.kit_id, ik.producto_id, p.nombre, p.precio_referencial, ik.cantidad
              FROM items_kit ik
              JOIN productos p ON p.id = ik.producto_id
             ORDER BY ik.kit_id, ik.orden, ik.id
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    KitItem {
                        product_id: row.get(1)?,
                        product_name: row.get(2)?,
                        reference_price: row.get(3)?,
                        quantity: row.get(4)?,
                    },
                ))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut grouped: HashMap<i64, Vec<KitItem>> = HashMap::new();
        for (kit_id, item) in rows {
            grouped.entry(kit_id).or_default().push(item);
        }
        Ok(grouped)
    }
}

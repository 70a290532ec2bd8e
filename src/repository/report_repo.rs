// ==========================================
// 物资集散中心 - 报表查询仓储
// ==========================================
// 已取消的出库单不计入任何汇总
// 实发数量为空时按申请数量计
// ==========================================

use crate::domain::report::{CategoryTotal, DashboardStats, ImpactSummaryRow, ReasonTotal};
use crate::repository::db_utils::get_ts;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct ReportRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReportRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 每个出库单的影响汇总（最新在前）
    pub fn impact_summary(&self) -> RepositoryResult<Vec<ImpactSummaryRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT despacho_id, codigo, motivo, beneficiario, provincia, fecha_despacho,
                   lineas_productos, total_unidades, valor_estimado
              FROM v_impacto_resumen
             ORDER BY fecha_despacho DESC, despacho_id DESC
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ImpactSummaryRow {
                    dispatch_id: row.get(0)?,
                    code: row.get(1)?,
                    reason: row.get(2)?,
                    beneficiary: row.get(3)?,
                    province: row.get(4)?,
                    dispatch_date: get_ts(row, 5)?,
                    product_lines: row.get(6)?,
                    total_units: row.get(7)?,
                    estimated_value: row.get(8)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 按产品类别汇总
    pub fn totals_by_category(&self) -> RepositoryResult<Vec<CategoryTotal>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT p.categoria,
                   COALESCE(SUM(COALESCE(e.cantidad_despachada, e.cantidad_solicitada)), 0),
                   COALESCE(SUM(COALESCE(e.cantidad_despachada, e.cantidad_solicitada) * p.precio_referencial), 0.0)
              FROM egresos e
              JOIN despachos d ON d.id = e.despacho_id
              JOIN productos p ON p.id = e.producto_id
             WHERE d.estado <> 'cancelado'
             GROUP BY p.categoria
             ORDER BY 2 DESC, p.categoria
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CategoryTotal {
                    category: row.get(0)?,
                    total_quantity: row.get(1)?,
                    estimated_value: row.get(2)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 按出库原因汇总
    pub fn totals_by_reason(&self) -> RepositoryResult<Vec<ReasonTotal>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT motivo, COUNT(*), COALESCE(SUM(total_unidades), 0),
                   COALESCE(SUM(valor_estimado), 0.0)
              FROM v_impacto_resumen
             GROUP BY motivo
             ORDER BY 2 DESC, motivo
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ReasonTotal {
                    reason: row.get(0)?,
                    dispatch_count: row.get(1)?,
                    total_units: row.get(2)?,
                    estimated_value: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 仪表盘统计
    pub fn dashboard_stats(&self) -> RepositoryResult<DashboardStats> {
        let conn = self.get_conn()?;
        let stats = conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM donantes),
                (SELECT COUNT(*) FROM productos WHERE activo = 1),
                (SELECT COUNT(*) FROM beneficiarios),
                (SELECT COUNT(*) FROM despachos WHERE estado <> 'cancelado'),
                (SELECT COALESCE(SUM(cantidad * COALESCE(precio_unitario, 0)), 0.0) FROM ingresos),
                (SELECT COALESCE(SUM(b.poblacion_estimada), 0)
                   FROM beneficiarios b
                  WHERE EXISTS (
                      SELECT 1 FROM despachos d
                       WHERE d.beneficiario_id = b.id AND d.estado <> 'cancelado'
                  ))
            "#,
            [],
            |row| {
                Ok(DashboardStats {
                    total_donors: row.get(0)?,
                    total_products: row.get(1)?,
                    total_beneficiaries: row.get(2)?,
                    total_dispatches: row.get(3)?,
                    total_donated_value: row.get(4)?,
                    people_served: row.get(5)?,
                })
            },
        )?;
        Ok(stats)
    }
}

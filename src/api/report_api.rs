// ==========================================
// 物资集散中心 - 报表 API
// ==========================================
// 职责: 影响汇总、按类别/原因汇总、仪表盘统计（仅数据）
// ==========================================

use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::auth::require_permission;
use crate::domain::report::{CategoryTotal, DashboardStats, ImpactSummaryRow, ReasonTotal};
use crate::domain::user::{Actor, Permission};
use crate::repository::ReportRepository;

pub struct ReportApi {
    report_repo: Arc<ReportRepository>,
}

impl ReportApi {
    pub fn new(report_repo: Arc<ReportRepository>) -> Self {
        Self { report_repo }
    }

    /// 每个出库单的影响汇总（已取消的不计）
    pub fn impact_summary(&self, actor: &Actor) -> ApiResult<Vec<ImpactSummaryRow>> {
        require_permission(actor, Permission::Reports)?;
        Ok(self.report_repo.impact_summary()?)
    }

    pub fn totals_by_category(&self, actor: &Actor) -> ApiResult<Vec<CategoryTotal>> {
        require_permission(actor, Permission::Reports)?;
        Ok(self.report_repo.totals_by_category()?)
    }

    pub fn totals_by_reason(&self, actor: &Actor) -> ApiResult<Vec<ReasonTotal>> {
        require_permission(actor, Permission::Reports)?;
        Ok(self.report_repo.totals_by_reason()?)
    }

    /// 首页仪表盘统计（任何登录用户可见）
    pub fn dashboard_stats(&self) -> ApiResult<DashboardStats> {
        Ok(self.report_repo.dashboard_stats()?)
    }
}

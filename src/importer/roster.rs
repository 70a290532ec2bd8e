// ==========================================
// 物资集散中心 - 志愿者名册导入
// ==========================================
// 列: email（必填）, nombre（必填）, rol（缺省 estudiante）,
//     activo_hasta（可选）, password（可选，缺省临时口令）
// 行级错误收集后继续处理下一行
// ==========================================

use crate::domain::types::UserRole;
use crate::domain::user::{Actor, ProvisionRequest, UserProfile};
use crate::engine::provisioning::UserProvisioner;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{RawRecord, UniversalFileParser};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, instrument, warn};

pub const COL_EMAIL: &str = "email";
pub const COL_NAME: &str = "nombre";
pub const COL_ROLE: &str = "rol";
pub const COL_ACTIVE_UNTIL: &str = "activo_hasta";
pub const COL_PASSWORD: &str = "password";

/// 行级错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRowError {
    pub row: usize,
    pub email: Option<String>,
    pub message: String,
}

/// 导入报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterImportReport {
    pub total_rows: usize,
    pub created: Vec<UserProfile>,
    pub errors: Vec<RosterRowError>,
}

/// 解析 activo_hasta
///
/// 支持 YYYY-MM-DD（当天 23:59:59 失效）、YYYY-MM-DD HH:MM[:SS]、
/// 以及 Excel 日期序列号
pub fn parse_active_until(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(ts);
        }
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return date.and_hms_opt(23, 59, 59);
        }
    }
    // Excel 序列号（1899-12-30 起算的天数）
    let serial: f64 = value.parse().ok()?;
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    let ts = base + Duration::seconds(seconds);
    if serial.fract() == 0.0 {
        ts.date().and_hms_opt(23, 59, 59)
    } else {
        Some(ts)
    }
}

/// 解析角色（接受数据库取值，不区分大小写）
pub fn parse_role(value: &str) -> Option<UserRole> {
    let value = value.trim().to_lowercase();
    if value.is_empty() {
        return Some(UserRole::Student);
    }
    UserRole::from_db_str(&value)
}

/// 将原始记录转换为开通请求，返回 (请求列表(带行号), 行级错误)
pub fn map_records(
    records: &[RawRecord],
) -> ImportResult<(Vec<(usize, ProvisionRequest)>, Vec<RosterRowError>)> {
    if records.is_empty() {
        return Err(ImportError::EmptyFile);
    }
    for required in [COL_EMAIL, COL_NAME] {
        if !records.iter().any(|(_, r)| r.contains_key(required)) {
            return Err(ImportError::MissingColumn(required.to_string()));
        }
    }

    let mut requests = Vec::new();
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (row, record) in records {
        let field = |name: &str| record.get(name).map(|v| v.trim()).unwrap_or("");
        let email = field(COL_EMAIL);
        let row_error = |message: String| RosterRowError {
            row: *row,
            email: (!email.is_empty()).then(|| email.to_string()),
            message,
        };

        if email.is_empty() {
            errors.push(row_error("email 为空".to_string()));
            continue;
        }
        if !seen.insert(email.to_lowercase()) {
            errors.push(row_error("文件内 email 重复".to_string()));
            continue;
        }
        let name = field(COL_NAME);
        if name.is_empty() {
            errors.push(row_error("nombre 为空".to_string()));
            continue;
        }
        let Some(role) = parse_role(field(COL_ROLE)) else {
            errors.push(row_error(format!("未知角色: {}", field(COL_ROLE))));
            continue;
        };
        let active_until = match field(COL_ACTIVE_UNTIL) {
            "" => None,
            raw => match parse_active_until(raw) {
                Some(ts) => Some(ts),
                None => {
                    errors.push(row_error(format!("activo_hasta 格式错误: {}", raw)));
                    continue;
                }
            },
        };
        let password = Some(field(COL_PASSWORD))
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        requests.push((
            *row,
            ProvisionRequest {
                email: email.to_string(),
                password,
                name: name.to_string(),
                role,
                active_until,
            },
        ));
    }

    Ok((requests, errors))
}

// ==========================================
// RosterImporter - 名册导入器
// ==========================================
pub struct RosterImporter<P>
where
    P: UserProvisioner,
{
    provisioner: P,
}

impl<P> RosterImporter<P>
where
    P: UserProvisioner,
{
    pub fn new(provisioner: P) -> Self {
        Self { provisioner }
    }

    /// 从文件导入
    #[instrument(skip(self, actor, file_path), fields(actor = %actor.user_id))]
    pub fn import_file<F: AsRef<Path>>(
        &self,
        actor: &Actor,
        file_path: F,
    ) -> ImportResult<RosterImportReport> {
        let records = UniversalFileParser.parse(file_path)?;
        self.import_records(actor, &records)
    }

    /// 从已解析的记录导入
    pub fn import_records(
        &self,
        actor: &Actor,
        records: &[RawRecord],
    ) -> ImportResult<RosterImportReport> {
        let (requests, mut errors) = map_records(records)?;

        let mut created = Vec::with_capacity(requests.len());
        for (row, request) in requests {
            match self.provisioner.provision(actor, &request) {
                Ok(profile) => created.push(profile),
                Err(e) => {
                    warn!(row, email = %request.email, error = %e, "名册行开通失败");
                    errors.push(RosterRowError {
                        row,
                        email: Some(request.email.clone()),
                        message: e.to_string(),
                    });
                }
            }
        }
        errors.sort_by_key(|e| e.row);

        info!(total = records.len(), created = created.len(), errors = errors.len(), "名册导入完成");
        Ok(RosterImportReport {
            total_rows: records.len(),
            created,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn record(row: usize, pairs: &[(&str, &str)]) -> RawRecord {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        (row, map)
    }

    #[test]
    fn test_parse_active_until_formats() {
        let end_of_day = NaiveDate::from_ymd_opt(2026, 7, 1)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        assert_eq!(parse_active_until("2026-07-01"), Some(end_of_day));
        assert_eq!(parse_active_until("01/07/2026"), Some(end_of_day));
        assert_eq!(parse_active_until("46204"), Some(end_of_day));
        assert_eq!(
            parse_active_until("2026-07-01 08:30"),
            NaiveDate::from_ymd_opt(2026, 7, 1).unwrap().and_hms_opt(8, 30, 0)
        );
        assert_eq!(parse_active_until("pronto"), None);
    }

    #[test]
    fn test_map_records_collects_row_errors() {
        let records = vec![
            record(2, &[("email", "a@x.org"), ("nombre", "Ana"), ("rol", "Voluntario")]),
            record(3, &[("email", "A@x.org"), ("nombre", "Ana bis")]),
            record(4, &[("email", "b@x.org"), ("nombre", "Beto"), ("rol", "jefe")]),
            record(5, &[("email", ""), ("nombre", "Sin correo")]),
            record(6, &[("email", "c@x.org"), ("nombre", "Caro"), ("activo_hasta", "mañana")]),
            record(7, &[("email", "d@x.org"), ("nombre", "Dani")]),
        ];
        let (requests, errors) = map_records(&records).unwrap();

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].1.role, UserRole::Volunteer);
        assert_eq!(requests[1].1.role, UserRole::Student);
        let rows: Vec<usize> = errors.iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_missing_required_column() {
        let records = vec![record(2, &[("correo", "a@x.org"), ("nombre", "Ana")])];
        assert!(matches!(
            map_records(&records),
            Err(ImportError::MissingColumn(c)) if c == "email"
        ));
    }
}

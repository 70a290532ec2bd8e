// ==========================================
// 物资集散中心 - 仓储公共工具
// ==========================================
// 职责: 日期/时间戳/枚举列的统一解析，LIKE 模式转义，IN 子句构建
// 约束: 未知取值在边界处报错，不做静默兜底
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::Row;

/// 日期存储格式
pub const DATE_FMT: &str = "%Y-%m-%d";
/// 时间戳存储格式
pub const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// 格式化日期
pub fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

/// 格式化时间戳
pub fn fmt_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FMT).to_string()
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

/// 解析日期字符串（兼容带时间部分的取值）
pub fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, DATE_FMT)
        .ok()
        .or_else(|| s.get(..10).and_then(|p| NaiveDate::parse_from_str(p, DATE_FMT).ok()))
}

/// 解析时间戳字符串（兼容纯日期与 RFC3339 的 'T' 分隔）
pub fn parse_ts_str(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, TS_FMT)
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| s.get(..19).and_then(|p| NaiveDateTime::parse_from_str(p, "%Y-%m-%dT%H:%M:%S").ok()))
        .or_else(|| parse_date_str(s).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

/// 读取必填日期列
pub fn get_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    parse_date_str(&raw).ok_or_else(|| conversion_error(idx, format!("无效日期: {}", raw)))
}

/// 读取可空日期列
pub fn get_opt_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => parse_date_str(&raw)
            .map(Some)
            .ok_or_else(|| conversion_error(idx, format!("无效日期: {}", raw))),
        None => Ok(None),
    }
}

/// 读取必填时间戳列
pub fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    parse_ts_str(&raw).ok_or_else(|| conversion_error(idx, format!("无效时间戳: {}", raw)))
}

/// 读取可空时间戳列
pub fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => parse_ts_str(&raw)
            .map(Some)
            .ok_or_else(|| conversion_error(idx, format!("无效时间戳: {}", raw))),
        None => Ok(None),
    }
}

/// 读取枚举列（未知取值报错）
pub fn get_enum<T>(
    row: &Row<'_>,
    idx: usize,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| conversion_error(idx, format!("未知枚举取值: {}", raw)))
}

/// 构造“包含”匹配的 LIKE 模式（转义 % _ \，配合 ESCAPE '\'）
pub fn contains_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// 构建 IN 子句的 SQL 片段
///
/// # 示例
/// ```
/// use centro_acopio::repository::db_utils::build_in_clause;
///
/// let ids = vec!["a".to_string(), "b".to_string()];
/// assert_eq!(build_in_clause("id", &ids), "id IN (?, ?)");
///
/// // 空列表返回永假条件
/// let empty: Vec<String> = vec![];
/// assert_eq!(build_in_clause("id", &empty), "1 = 0");
/// ```
pub fn build_in_clause<T: AsRef<str>>(column_name: &str, values: &[T]) -> String {
    if values.is_empty() {
        return "1 = 0".to_string();
    }

    let placeholders = values.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    format!("{} IN ({})", column_name, placeholders)
}

// ==========================================
// 物资集散中心 - 名册导入错误类型
// ==========================================
// 文件级错误中止整个名册导入；
// 行级问题（邮箱格式、角色未知、重复账号）收集为 RosterRowError，不在此处
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 名册文件 =====
    #[error("名册文件不存在: {0}")]
    FileNotFound(String),

    #[error("名册格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("名册读取失败: {0}")]
    FileReadError(String),

    #[error("名册表格解析失败: {0}")]
    ExcelParseError(String),

    #[error("名册 CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 名册结构 =====
    #[error("名册缺少必需列: {0}")]
    MissingColumn(String),

    #[error("名册没有数据行")]
    EmptyFile,
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

pub type ImportResult<T> = Result<T, ImportError>;

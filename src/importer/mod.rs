// ==========================================
// 物资集散中心 - 导入层
// ==========================================
// 职责: 外部名册导入（批量开通志愿者账号）
// 支持: Excel, CSV
// ==========================================

pub mod error;
pub mod file_parser;
pub mod roster;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, FileParser, RawRecord, UniversalFileParser};
pub use roster::{RosterImportReport, RosterImporter, RosterRowError};

// ==========================================
// 物资集散中心 - 操作日志数据仓储
// ==========================================
// 对齐: action_log 表
// 红线: 所有库存写入必须留痕（与业务写入同一事务）
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use core::ActionLogRepository;

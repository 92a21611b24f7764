// ==========================================
// 教务管理系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository错误为用户友好的错误消息
// 约定: 业务规则违反以结构化错误返回, 不以 panic 形式抛出;
//       仅真正意外的情况落入数据库/内部错误
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
/// 所有错误信息必须包含显式原因
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 约束违反错误 (带结构化详情)
    // ==========================================
    /// 先修关系成环: 新边会使依赖图出现循环
    #[error("先修关系成环: course_id={course_id}, prereq_course_id={prereq_course_id}")]
    PrerequisiteCycle {
        course_id: String,
        prereq_course_id: String,
    },

    /// 教室时段冲突
    #[error("教室时段冲突: room_id={room_id}, 冲突预约{}条", .conflicts.len())]
    RoomConflict {
        room_id: String,
        conflicts: Vec<ConflictInfo>,
    },

    /// 权重之和超限
    #[error("权重之和超限: sum={sum}, 上限100")]
    WeightSumExceeded { sum: f64 },

    // ==========================================
    // 数据质量错误
    // ==========================================
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }

            // 业务规则错误
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }

            // 数据质量错误
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

// ==========================================
// 冲突详情
// ==========================================

/// 教室时段冲突详情
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConflictInfo {
    /// 冲突预约ID
    pub reservation_id: String,
    /// 冲突预约状态
    pub status: String,
    /// 冲突区间开始
    pub starts_at: String,
    /// 冲突区间结束
    pub ends_at: String,
    /// 申请人
    pub reserved_by: String,
}

impl From<&crate::domain::room::Reservation> for ConflictInfo {
    fn from(r: &crate::domain::room::Reservation) -> Self {
        Self {
            reservation_id: r.reservation_id.clone(),
            status: r.status.to_string(),
            starts_at: r.starts_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ends_at: r.ends_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            reserved_by: r.reserved_by.clone(),
        }
    }
}

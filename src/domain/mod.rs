// ==========================================
// 教务管理系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含服务逻辑
// ==========================================

pub mod action_log;
pub mod attribute;
pub mod course;
pub mod offering;
pub mod room;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use attribute::{AttributeDefinition, AttributeValue};
pub use course::{Course, PrerequisiteEdge};
pub use offering::{letter_grade, CourseOffering, GradeComponent};
pub use room::{RecurrenceRule, Reservation, Room};
pub use types::{
    AttributeValueType, EntityKind, RecurrenceFrequency, ReservationStatus,
};

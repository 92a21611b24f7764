// ==========================================
// 教务管理系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 学籍与教学资源后端
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AttributeValueType, EntityKind, RecurrenceFrequency, ReservationStatus,
};

// 领域实体
pub use domain::{
    letter_grade, ActionLog, ActionType, AttributeDefinition, AttributeValue, Course,
    CourseOffering, GradeComponent, PrerequisiteEdge, RecurrenceRule, Reservation, Room,
};

// API
pub use api::{
    ApiError, ApiResult, AttributeApi, ConflictInfo, CourseApi, GradingApi,
    RecurringCreateResult, ReservationApi, SkippedOccurrence,
};

// 应用状态
pub use app::{get_default_db_path, AppState};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "教务管理系统";

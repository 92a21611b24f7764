// ==========================================
// 教务管理系统 - 操作日志领域模型
// ==========================================
// 职责: 审计追踪
// 红线: 业务写操作(先修关系、预约审批、成绩构成替换)必须记录
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    AddPrerequisite,    // 新增先修关系
    RemovePrerequisite, // 移除先修关系
    ApproveReservation, // 批准预约
    RejectReservation,  // 驳回预约
    CancelReservation,  // 取消预约
    ReplaceGradeScheme, // 替换成绩构成
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::AddPrerequisite => write!(f, "ADD_PREREQUISITE"),
            ActionType::RemovePrerequisite => write!(f, "REMOVE_PREREQUISITE"),
            ActionType::ApproveReservation => write!(f, "APPROVE_RESERVATION"),
            ActionType::RejectReservation => write!(f, "REJECT_RESERVATION"),
            ActionType::CancelReservation => write!(f, "CANCEL_RESERVATION"),
            ActionType::ReplaceGradeScheme => write!(f, "REPLACE_GRADE_SCHEME"),
        }
    }
}

// ==========================================
// ActionLog - 操作日志
// ==========================================
// 用途: 审计追踪, 只追加不修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,               // 日志ID (UUID)
    pub action_type: ActionType,         // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,        // 操作时间戳
    pub actor: String,                   // 操作人
    pub entity_id: Option<String>,       // 关联实体ID (课程/预约/开课)
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 详细描述
}

impl ActionLog {
    /// 创建新的操作日志（自动生成 UUID 和时间戳）
    pub fn new(
        action_type: ActionType,
        actor: String,
        entity_id: Option<String>,
        payload_json: Option<JsonValue>,
        detail: Option<String>,
    ) -> Self {
        Self {
            action_id: Uuid::new_v4().to_string(),
            action_type,
            action_ts: chrono::Local::now().naive_local(),
            actor,
            entity_id,
            payload_json,
            detail,
        }
    }
}

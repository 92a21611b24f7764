// ==========================================
// 教务管理系统 - 领域类型定义
// ==========================================
// 职责: 定义跨模块共享的枚举类型
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 实体类别 (Entity Kind)
// ==========================================
// 可挂载扩展属性的核心实体族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Course,   // 课程
    User,     // 用户(教师/学生)
    Section,  // 教学班
    Room,     // 教室
    Offering, // 开课(课程+学期)
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Course => write!(f, "COURSE"),
            EntityKind::User => write!(f, "USER"),
            EntityKind::Section => write!(f, "SECTION"),
            EntityKind::Room => write!(f, "ROOM"),
            EntityKind::Offering => write!(f, "OFFERING"),
        }
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COURSE" => Ok(EntityKind::Course),
            "USER" => Ok(EntityKind::User),
            "SECTION" => Ok(EntityKind::Section),
            "ROOM" => Ok(EntityKind::Room),
            "OFFERING" => Ok(EntityKind::Offering),
            other => Err(format!("未知的实体类别: {}", other)),
        }
    }
}

// ==========================================
// 属性值类型 (Attribute Value Type)
// ==========================================
// 属性定义声明的值类型,写入时按此类型校验
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeValueType {
    Text,    // 任意文本
    Int,     // 整数
    Decimal, // 小数
    Bool,    // 布尔 (true/false)
    Json,    // JSON 文档
}

impl fmt::Display for AttributeValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValueType::Text => write!(f, "TEXT"),
            AttributeValueType::Int => write!(f, "INT"),
            AttributeValueType::Decimal => write!(f, "DECIMAL"),
            AttributeValueType::Bool => write!(f, "BOOL"),
            AttributeValueType::Json => write!(f, "JSON"),
        }
    }
}

impl FromStr for AttributeValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEXT" => Ok(AttributeValueType::Text),
            "INT" => Ok(AttributeValueType::Int),
            "DECIMAL" => Ok(AttributeValueType::Decimal),
            "BOOL" => Ok(AttributeValueType::Bool),
            "JSON" => Ok(AttributeValueType::Json),
            other => Err(format!("未知的属性值类型: {}", other)),
        }
    }
}

// ==========================================
// 预约状态 (Reservation Status)
// ==========================================
// 状态机: PENDING → APPROVED / REJECTED / CANCELLED
//         APPROVED → CANCELLED
// 冲突检测只考虑 PENDING / APPROVED 两种占用态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,   // 待审批
    Approved,  // 已批准
    Rejected,  // 已驳回
    Cancelled, // 已取消
}

impl ReservationStatus {
    /// 是否占用教室时段 (参与冲突检测)
    pub fn occupies_room(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Approved)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationStatus::Pending => write!(f, "PENDING"),
            ReservationStatus::Approved => write!(f, "APPROVED"),
            ReservationStatus::Rejected => write!(f, "REJECTED"),
            ReservationStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ReservationStatus::Pending),
            "APPROVED" => Ok(ReservationStatus::Approved),
            "REJECTED" => Ok(ReservationStatus::Rejected),
            "CANCELLED" => Ok(ReservationStatus::Cancelled),
            other => Err(format!("未知的预约状态: {}", other)),
        }
    }
}

// ==========================================
// 周期频率 (Recurrence Frequency)
// ==========================================
// 周期性预约的展开步长
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurrenceFrequency {
    Daily,  // 每天
    Weekly, // 每周
}

impl RecurrenceFrequency {
    /// 相邻两次发生之间的天数
    pub fn step_days(&self) -> i64 {
        match self {
            RecurrenceFrequency::Daily => 1,
            RecurrenceFrequency::Weekly => 7,
        }
    }
}

impl fmt::Display for RecurrenceFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrenceFrequency::Daily => write!(f, "DAILY"),
            RecurrenceFrequency::Weekly => write!(f, "WEEKLY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_roundtrip() {
        for kind in [
            EntityKind::Course,
            EntityKind::User,
            EntityKind::Section,
            EntityKind::Room,
            EntityKind::Offering,
        ] {
            let s = kind.to_string();
            assert_eq!(s.parse::<EntityKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_reservation_status_occupies() {
        assert!(ReservationStatus::Pending.occupies_room());
        assert!(ReservationStatus::Approved.occupies_room());
        assert!(!ReservationStatus::Rejected.occupies_room());
        assert!(!ReservationStatus::Cancelled.occupies_room());
    }

    #[test]
    fn test_value_type_parse_unknown() {
        assert!("FLOAT".parse::<AttributeValueType>().is_err());
    }
}

// ==========================================
// 教务管理系统 - 教室与预约领域模型
// ==========================================
// 职责: 教室主数据、预约区间、周期规则
// 红线: 同教室占用态(PENDING/APPROVED)区间不得重叠
// 区间语义: 左闭右开 [starts_at, ends_at)
// ==========================================

use crate::domain::types::{RecurrenceFrequency, ReservationStatus};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// Room - 教室
// ==========================================
// 薄协作实体: 仅提供按ID查找/保存, 供存在性检查使用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,    // 教室ID (UUID)
    pub building: String,   // 楼栋
    pub room_no: String,    // 房间号
    pub capacity: i32,      // 容量
    pub created_at: String, // 创建时间
}

impl Room {
    /// 创建新教室（自动生成 UUID 和时间戳）
    pub fn new(building: String, room_no: String, capacity: i32) -> Self {
        let now = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        Self {
            room_id: Uuid::new_v4().to_string(),
            building,
            room_no,
            capacity,
            created_at: now,
        }
    }
}

// ==========================================
// Reservation - 教室预约
// ==========================================
// 状态机: PENDING → APPROVED / REJECTED / CANCELLED,
//         APPROVED → CANCELLED; 状态只流转一次, 不回退
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: String,            // 预约ID (UUID)
    pub room_id: String,                   // 教室ID
    pub starts_at: NaiveDateTime,          // 开始时间 (含)
    pub ends_at: NaiveDateTime,            // 结束时间 (不含)
    pub status: ReservationStatus,         // 预约状态
    pub purpose: String,                   // 用途说明
    pub reserved_by: String,               // 申请人
    pub series_id: Option<String>,         // 周期序列ID (单次预约为 None)
    pub approved_by: Option<String>,       // 审批人 (批准时记录)
    pub approved_at: Option<NaiveDateTime>, // 审批时间 (批准时记录)
    pub created_at: String,                // 创建时间
}

impl Reservation {
    /// 创建新预约, 初始状态为 PENDING
    pub fn new(
        room_id: String,
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
        purpose: String,
        reserved_by: String,
        series_id: Option<String>,
    ) -> Self {
        let now = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        Self {
            reservation_id: Uuid::new_v4().to_string(),
            room_id,
            starts_at,
            ends_at,
            status: ReservationStatus::Pending,
            purpose,
            reserved_by,
            series_id,
            approved_by: None,
            approved_at: None,
            created_at: now,
        }
    }

    /// 判断候选区间是否与本预约重叠 (左闭右开语义, 边界相接不算重叠)
    pub fn overlaps(&self, starts_at: NaiveDateTime, ends_at: NaiveDateTime) -> bool {
        self.starts_at < ends_at && self.ends_at > starts_at
    }
}

// ==========================================
// RecurrenceRule - 周期规则
// ==========================================
// 展开为具体发生次, 每次独立做冲突检测
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: RecurrenceFrequency, // 频率
    pub occurrences: u32,               // 发生次数 (含首个)
}

impl RecurrenceRule {
    /// 从首个发生次展开整个序列的 (开始, 结束) 区间列表
    pub fn expand(
        &self,
        first_start: NaiveDateTime,
        first_end: NaiveDateTime,
    ) -> Vec<(NaiveDateTime, NaiveDateTime)> {
        let step = chrono::Duration::days(self.frequency.step_days());
        (0..self.occurrences as i64)
            .map(|i| (first_start + step * i as i32, first_end + step * i as i32))
            .collect()
    }
}

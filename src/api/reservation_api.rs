// ==========================================
// 教务管理系统 - 教室预约 API
// ==========================================
// 职责: 教室主数据维护、预约创建/审批/驳回/取消、冲突检测、周期预约展开
// 红线: 同教室占用态(PENDING/APPROVED)区间不得重叠;
//       冲突检查与写入在仓储层单事务内完成
// 策略: 周期序列逐次检测, 冲突发生次跳过并单独报告, 其余照常创建
// ==========================================

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult, ConflictInfo};
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::room::{RecurrenceRule, Reservation, Room};
use crate::domain::types::ReservationStatus;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::room_repo::{
    ExclusiveWriteOutcome, ReservationRepository, RoomRepository,
};

// ==========================================
// DTO
// ==========================================

/// 周期预约中被跳过的发生次
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedOccurrence {
    /// 发生次开始时间
    pub starts_at: String,
    /// 发生次结束时间
    pub ends_at: String,
    /// 拦截它的冲突预约
    pub conflicts: Vec<ConflictInfo>,
}

/// 周期预约创建结果
///
/// 部分成功是显式结果: created 与 skipped 同时返回,
/// 需要"全有或全无"的调用方可据此取消已创建的发生次
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringCreateResult {
    /// 序列ID
    pub series_id: String,
    /// 已创建的发生次
    pub created: Vec<String>,
    /// 因冲突被跳过的发生次
    pub skipped: Vec<SkippedOccurrence>,
}

// ==========================================
// ReservationApi - 教室预约 API
// ==========================================

/// 教室预约API
///
/// 职责：
/// 1. 教室创建与查询
/// 2. 预约创建（输入校验 + 冲突拦截）
/// 3. 预约审批/驳回/取消（单次状态流转）
/// 4. 周期预约展开与逐次检测
/// 5. ActionLog记录
pub struct ReservationApi {
    room_repo: Arc<RoomRepository>,
    reservation_repo: Arc<ReservationRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    config: Arc<ConfigManager>,
}

impl ReservationApi {
    /// 创建新的ReservationApi实例
    pub fn new(
        room_repo: Arc<RoomRepository>,
        reservation_repo: Arc<ReservationRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            room_repo,
            reservation_repo,
            action_log_repo,
            config,
        }
    }

    // ==========================================
    // 教室主数据
    // ==========================================

    /// 创建教室
    pub fn create_room(&self, building: &str, room_no: &str, capacity: i32) -> ApiResult<Room> {
        if building.trim().is_empty() || room_no.trim().is_empty() {
            return Err(ApiError::InvalidInput("楼栋与房间号不能为空".to_string()));
        }
        if capacity <= 0 {
            return Err(ApiError::InvalidInput("教室容量必须为正".to_string()));
        }

        let room = Room::new(building.trim().to_string(), room_no.trim().to_string(), capacity);
        self.room_repo.insert(&room)?;

        tracing::info!("创建教室: {}-{} ({})", room.building, room.room_no, room.room_id);
        Ok(room)
    }

    /// 按ID查询教室
    pub fn get_room(&self, room_id: &str) -> ApiResult<Room> {
        self.room_repo
            .find_by_id(room_id)?
            .ok_or_else(|| ApiError::NotFound(format!("教室(id={})不存在", room_id)))
    }

    /// 列出全部教室
    pub fn list_rooms(&self) -> ApiResult<Vec<Room>> {
        Ok(self.room_repo.list_all()?)
    }

    // ==========================================
    // 冲突检测
    // ==========================================

    /// 查找候选区间的冲突预约
    ///
    /// # 参数
    /// - room_id: 教室ID
    /// - starts_at / ends_at: 候选区间 (左闭右开)
    ///
    /// # 返回
    /// - Ok(Vec<Reservation>): 占用态(PENDING/APPROVED)且区间相交的预约;
    ///   已驳回/已取消不参与; 边界相接不算冲突
    pub fn find_conflicts(
        &self,
        room_id: &str,
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
    ) -> ApiResult<Vec<Reservation>> {
        self.validate_interval(starts_at, ends_at)?;
        if !self.room_repo.exists(room_id)? {
            return Err(ApiError::NotFound(format!("教室(id={})不存在", room_id)));
        }

        Ok(self
            .reservation_repo
            .find_conflicts(room_id, starts_at, ends_at)?)
    }

    // ==========================================
    // 预约创建
    // ==========================================

    /// 创建单次预约
    ///
    /// # 返回
    /// - Ok(Reservation): 创建成功, 初始状态 PENDING
    /// - Err(InvalidInput): 区间不合法
    /// - Err(NotFound): 教室不存在
    /// - Err(RoomConflict): 存在占用态冲突预约
    pub fn create_reservation(
        &self,
        room_id: &str,
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
        purpose: &str,
        reserved_by: &str,
    ) -> ApiResult<Reservation> {
        self.validate_request(room_id, starts_at, ends_at, purpose, reserved_by)?;

        let reservation = Reservation::new(
            room_id.to_string(),
            starts_at,
            ends_at,
            purpose.trim().to_string(),
            reserved_by.trim().to_string(),
            None,
        );

        match self.reservation_repo.insert_exclusive(&reservation)? {
            ExclusiveWriteOutcome::Written => {
                tracing::info!(
                    "创建预约: room={} [{} ~ {}) by {}",
                    room_id,
                    starts_at,
                    ends_at,
                    reserved_by
                );
                Ok(reservation)
            }
            ExclusiveWriteOutcome::Blocked(conflicts) => Err(ApiError::RoomConflict {
                room_id: room_id.to_string(),
                conflicts: conflicts.iter().map(ConflictInfo::from).collect(),
            }),
        }
    }

    /// 创建周期预约
    ///
    /// 从首个发生次按规则展开, 每个发生次独立做冲突检测;
    /// 冲突发生次跳过并记入 skipped, 其余照常创建 (部分成功)
    ///
    /// # 返回
    /// - Ok(RecurringCreateResult): created 与 skipped 明细
    /// - Err(InvalidInput): 区间/次数不合法
    /// - Err(NotFound): 教室不存在
    pub fn create_recurring(
        &self,
        room_id: &str,
        first_start: NaiveDateTime,
        first_end: NaiveDateTime,
        rule: RecurrenceRule,
        purpose: &str,
        reserved_by: &str,
    ) -> ApiResult<RecurringCreateResult> {
        self.validate_request(room_id, first_start, first_end, purpose, reserved_by)?;

        if rule.occurrences == 0 {
            return Err(ApiError::InvalidInput("发生次数必须为正".to_string()));
        }
        let max_occurrences = self.config.reservation_max_occurrences()?;
        if rule.occurrences as usize > max_occurrences {
            return Err(ApiError::InvalidInput(format!(
                "发生次数超限: {} > {}",
                rule.occurrences, max_occurrences
            )));
        }

        let series_id = Uuid::new_v4().to_string();
        let mut created = Vec::new();
        let mut skipped = Vec::new();

        for (starts_at, ends_at) in rule.expand(first_start, first_end) {
            let occurrence = Reservation::new(
                room_id.to_string(),
                starts_at,
                ends_at,
                purpose.trim().to_string(),
                reserved_by.trim().to_string(),
                Some(series_id.clone()),
            );

            match self.reservation_repo.insert_exclusive(&occurrence)? {
                ExclusiveWriteOutcome::Written => {
                    created.push(occurrence.reservation_id);
                }
                ExclusiveWriteOutcome::Blocked(conflicts) => {
                    skipped.push(SkippedOccurrence {
                        starts_at: starts_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        ends_at: ends_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        conflicts: conflicts.iter().map(ConflictInfo::from).collect(),
                    });
                }
            }
        }

        tracing::info!(
            "创建周期预约: room={} series={} created={} skipped={}",
            room_id,
            series_id,
            created.len(),
            skipped.len()
        );

        Ok(RecurringCreateResult {
            series_id,
            created,
            skipped,
        })
    }

    // ==========================================
    // 状态流转
    // ==========================================

    /// 批准预约
    ///
    /// 创建到审批之间同教室可能已有其他预约获批,
    /// 仓储层在同一事务内复查冲突后才置为 APPROVED
    ///
    /// # 返回
    /// - Ok(()): 已批准, 记录审批人与时间
    /// - Err(NotFound): 预约不存在
    /// - Err(InvalidStateTransition): 当前状态不是 PENDING
    /// - Err(RoomConflict): 复查发现冲突, 状态未变
    pub fn approve(&self, reservation_id: &str, approver: &str) -> ApiResult<()> {
        if approver.trim().is_empty() {
            return Err(ApiError::InvalidInput("审批人不能为空".to_string()));
        }

        let now = chrono::Local::now().naive_local();
        let outcome = self
            .reservation_repo
            .approve_exclusive(reservation_id, approver, now)?;

        match outcome {
            ExclusiveWriteOutcome::Written => {
                self.action_log_repo.insert(&ActionLog::new(
                    ActionType::ApproveReservation,
                    approver.to_string(),
                    Some(reservation_id.to_string()),
                    None,
                    None,
                ))?;
                tracing::info!("批准预约: {} by {}", reservation_id, approver);
                Ok(())
            }
            ExclusiveWriteOutcome::Blocked(conflicts) => {
                let room_id = conflicts
                    .first()
                    .map(|c| c.room_id.clone())
                    .unwrap_or_default();
                Err(ApiError::RoomConflict {
                    room_id,
                    conflicts: conflicts.iter().map(ConflictInfo::from).collect(),
                })
            }
        }
    }

    /// 驳回预约 (仅 PENDING 可驳回)
    pub fn reject(&self, reservation_id: &str, approver: &str, reason: &str) -> ApiResult<()> {
        self.transition(
            reservation_id,
            &[ReservationStatus::Pending],
            ReservationStatus::Rejected,
            ActionType::RejectReservation,
            approver,
            Some(reason.to_string()),
        )
    }

    /// 取消预约 (PENDING/APPROVED 可取消)
    pub fn cancel(&self, reservation_id: &str, operator: &str) -> ApiResult<()> {
        self.transition(
            reservation_id,
            &[ReservationStatus::Pending, ReservationStatus::Approved],
            ReservationStatus::Cancelled,
            ActionType::CancelReservation,
            operator,
            None,
        )
    }

    /// 按ID查询预约
    pub fn get_reservation(&self, reservation_id: &str) -> ApiResult<Reservation> {
        self.reservation_repo
            .find_by_id(reservation_id)?
            .ok_or_else(|| ApiError::NotFound(format!("预约(id={})不存在", reservation_id)))
    }

    /// 列出某教室的全部预约
    pub fn list_by_room(&self, room_id: &str) -> ApiResult<Vec<Reservation>> {
        if !self.room_repo.exists(room_id)? {
            return Err(ApiError::NotFound(format!("教室(id={})不存在", room_id)));
        }
        Ok(self.reservation_repo.list_by_room(room_id)?)
    }

    /// 列出某周期序列的全部发生次
    pub fn list_by_series(&self, series_id: &str) -> ApiResult<Vec<Reservation>> {
        Ok(self.reservation_repo.list_by_series(series_id)?)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 区间校验: 结束必须晚于开始
    fn validate_interval(
        &self,
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
    ) -> ApiResult<()> {
        if ends_at <= starts_at {
            return Err(ApiError::InvalidInput(format!(
                "结束时间必须晚于开始时间: {} >= {}",
                starts_at, ends_at
            )));
        }
        Ok(())
    }

    /// 创建请求的公共校验
    fn validate_request(
        &self,
        room_id: &str,
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
        purpose: &str,
        reserved_by: &str,
    ) -> ApiResult<()> {
        self.validate_interval(starts_at, ends_at)?;
        if purpose.trim().is_empty() {
            return Err(ApiError::InvalidInput("用途说明不能为空".to_string()));
        }
        if reserved_by.trim().is_empty() {
            return Err(ApiError::InvalidInput("申请人不能为空".to_string()));
        }
        if !self.room_repo.exists(room_id)? {
            return Err(ApiError::NotFound(format!("教室(id={})不存在", room_id)));
        }
        Ok(())
    }

    /// 带前置状态校验的单次流转 + 日志
    fn transition(
        &self,
        reservation_id: &str,
        expected: &[ReservationStatus],
        next: ReservationStatus,
        action_type: ActionType,
        operator: &str,
        detail: Option<String>,
    ) -> ApiResult<()> {
        let reservation = self.get_reservation(reservation_id)?;

        let updated = self
            .reservation_repo
            .update_status_guarded(reservation_id, expected, next)?;
        if !updated {
            return Err(ApiError::InvalidStateTransition {
                from: reservation.status.to_string(),
                to: next.to_string(),
            });
        }

        self.action_log_repo.insert(&ActionLog::new(
            action_type,
            operator.to_string(),
            Some(reservation_id.to_string()),
            None,
            detail,
        ))?;

        tracing::info!("预约{}状态流转: {} → {}", reservation_id, reservation.status, next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_sqlite_connection;
    use crate::domain::types::RecurrenceFrequency;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    fn dt(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn setup_api() -> (ReservationApi, String) {
        let conn = open_sqlite_connection(":memory:").expect("Failed to open test db");
        let conn = Arc::new(Mutex::new(conn));
        let room_repo = Arc::new(
            RoomRepository::from_connection(conn.clone()).expect("Failed to create room repo"),
        );
        let reservation_repo = Arc::new(
            ReservationRepository::from_connection(conn.clone())
                .expect("Failed to create reservation repo"),
        );
        let action_log_repo = Arc::new(
            ActionLogRepository::from_connection(conn.clone()).expect("Failed to create log repo"),
        );
        let config =
            Arc::new(ConfigManager::from_connection(conn).expect("Failed to create config"));
        let api = ReservationApi::new(room_repo, reservation_repo, action_log_repo, config);

        let room = api.create_room("主楼", "101", 60).expect("Failed to create room");
        (api, room.room_id)
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let (api, room_id) = setup_api();

        let result = api.create_reservation(&room_id, dt(2, 12), dt(2, 10), "讲座", "t001");
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));

        let result = api.find_conflicts(&room_id, dt(2, 12), dt(2, 12));
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    }

    #[test]
    fn test_overlap_blocked_boundary_allowed() {
        let (api, room_id) = setup_api();

        let first = api
            .create_reservation(&room_id, dt(2, 10), dt(2, 12), "讲座", "t001")
            .expect("Failed to create");
        api.approve(&first.reservation_id, "admin")
            .expect("Failed to approve");

        // [11,13) 相交 → 拒绝
        let result = api.create_reservation(&room_id, dt(2, 11), dt(2, 13), "答辩", "t002");
        match result {
            Err(ApiError::RoomConflict { conflicts, .. }) => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].reservation_id, first.reservation_id);
            }
            other => panic!("Expected RoomConflict, got {:?}", other.map(|r| r.reservation_id)),
        }

        // [12,13) 边界相接 → 接受
        api.create_reservation(&room_id, dt(2, 12), dt(2, 13), "答辩", "t002")
            .expect("Failed to create boundary reservation");
    }

    #[test]
    fn test_cancelled_does_not_conflict() {
        let (api, room_id) = setup_api();

        let first = api
            .create_reservation(&room_id, dt(2, 10), dt(2, 12), "讲座", "t001")
            .expect("Failed to create");
        api.cancel(&first.reservation_id, "t001")
            .expect("Failed to cancel");

        // 同时段、但既有预约已取消 → 接受
        api.create_reservation(&room_id, dt(2, 10), dt(2, 12), "答辩", "t002")
            .expect("Failed to create over cancelled");
    }

    #[test]
    fn test_pending_occupies_slot() {
        let (api, room_id) = setup_api();

        // 待审批预约同样占用时段, 第二条同时段创建即被拦截
        api.create_reservation(&room_id, dt(2, 10), dt(2, 12), "讲座", "t001")
            .expect("Failed to create");
        let result = api.create_reservation(&room_id, dt(2, 10), dt(2, 12), "答辩", "t002");
        assert!(matches!(result, Err(ApiError::RoomConflict { .. })));
    }

    #[test]
    fn test_cancelled_reservation_cannot_be_approved() {
        let (api, room_id) = setup_api();

        let first = api
            .create_reservation(&room_id, dt(2, 10), dt(2, 12), "讲座", "t001")
            .expect("Failed to create");
        api.cancel(&first.reservation_id, "t001").expect("cancel");

        let result = api.approve(&first.reservation_id, "admin");
        assert!(matches!(
            result,
            Err(ApiError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_reject_then_slot_free() {
        let (api, room_id) = setup_api();

        let first = api
            .create_reservation(&room_id, dt(2, 10), dt(2, 12), "讲座", "t001")
            .expect("Failed to create");
        api.reject(&first.reservation_id, "admin", "时段保留给院系活动")
            .expect("Failed to reject");

        // 已驳回不占用时段
        api.create_reservation(&room_id, dt(2, 10), dt(2, 12), "答辩", "t002")
            .expect("Failed to create over rejected");

        // 已驳回不能取消
        let result = api.cancel(&first.reservation_id, "t001");
        assert!(matches!(
            result,
            Err(ApiError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_recurring_partial_success() {
        let (api, room_id) = setup_api();

        // 第二周同时段已被占用
        api.create_reservation(&room_id, dt(9, 10), dt(9, 12), "院系会议", "staff")
            .expect("Failed to create blocker");

        let result = api
            .create_recurring(
                &room_id,
                dt(2, 10),
                dt(2, 12),
                RecurrenceRule {
                    frequency: RecurrenceFrequency::Weekly,
                    occurrences: 3,
                },
                "例会",
                "t001",
            )
            .expect("Failed to create recurring");

        assert_eq!(result.created.len(), 2);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].conflicts.len(), 1);

        // 序列查询只含已创建的发生次
        let occurrences = api
            .list_by_series(&result.series_id)
            .expect("Failed to list series");
        assert_eq!(occurrences.len(), 2);
    }

    #[test]
    fn test_recurring_occurrence_cap() {
        let (api, room_id) = setup_api();

        let result = api.create_recurring(
            &room_id,
            dt(2, 10),
            dt(2, 12),
            RecurrenceRule {
                frequency: RecurrenceFrequency::Weekly,
                occurrences: 1000,
            },
            "例会",
            "t001",
        );
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    }

    #[test]
    fn test_unknown_room_is_not_found() {
        let (api, _) = setup_api();
        let result = api.create_reservation("ghost", dt(2, 10), dt(2, 12), "讲座", "t001");
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}

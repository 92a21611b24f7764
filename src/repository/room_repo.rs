// ==========================================
// 教务管理系统 - 教室与预约仓储
// ==========================================
// 职责: 管理 room 表与 room_reservation 表
// 约束: 同教室占用态(PENDING/APPROVED)区间不得重叠;
//       SQLite 无法表达区间排他约束, 以"单事务内冲突查询+写入"
//       保证检查与写入之间不被其他写入者插入
// 区间语义: 左闭右开, 边界相接不算重叠
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::room::{Reservation, Room};
use crate::domain::types::ReservationStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Result as SqliteResult};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// 时间戳落库格式
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(col: usize, s: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}

// ==========================================
// RoomRepository - 教室仓储
// ==========================================
pub struct RoomRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RoomRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.ensure_table()?;
        Ok(repo)
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_table()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 确保表存在（如果不存在则创建）
    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS room (
              room_id TEXT PRIMARY KEY,
              building TEXT NOT NULL,
              room_no TEXT NOT NULL,
              capacity INTEGER NOT NULL,
              created_at TEXT NOT NULL DEFAULT (datetime('now')),
              UNIQUE(building, room_no)
            );
            "#,
        )?;
        Ok(())
    }

    /// 保存教室
    pub fn insert(&self, room: &Room) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO room (room_id, building, room_no, capacity, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                room.room_id,
                room.building,
                room.room_no,
                room.capacity,
                room.created_at,
            ],
        )?;
        Ok(())
    }

    /// 按ID查找教室（缺失返回 None）
    pub fn find_by_id(&self, room_id: &str) -> RepositoryResult<Option<Room>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT room_id, building, room_no, capacity, created_at FROM room WHERE room_id = ?1",
        )?;

        let result = stmt.query_row(params![room_id], |row| {
            Ok(Room {
                room_id: row.get(0)?,
                building: row.get(1)?,
                room_no: row.get(2)?,
                capacity: row.get(3)?,
                created_at: row.get(4)?,
            })
        });

        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 教室是否存在
    pub fn exists(&self, room_id: &str) -> RepositoryResult<bool> {
        Ok(self.find_by_id(room_id)?.is_some())
    }

    /// 列出全部教室（按楼栋+房间号排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<Room>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT room_id, building, room_no, capacity, created_at FROM room ORDER BY building, room_no",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(Room {
                    room_id: row.get(0)?,
                    building: row.get(1)?,
                    room_no: row.get(2)?,
                    capacity: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }
}

// ==========================================
// 预约写入结果
// ==========================================

/// 排他写入的结果: 成功, 或者被既有占用预约挡住
#[derive(Debug)]
pub enum ExclusiveWriteOutcome {
    /// 写入完成
    Written,
    /// 存在冲突, 未写入
    Blocked(Vec<Reservation>),
}

// ==========================================
// ReservationRepository - 预约仓储
// ==========================================
pub struct ReservationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReservationRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.ensure_table()?;
        Ok(repo)
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_table()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 确保表存在（如果不存在则创建）
    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS room_reservation (
              reservation_id TEXT PRIMARY KEY,
              room_id TEXT NOT NULL,
              starts_at TEXT NOT NULL,
              ends_at TEXT NOT NULL,
              status TEXT NOT NULL,
              purpose TEXT NOT NULL,
              reserved_by TEXT NOT NULL,
              series_id TEXT,
              approved_by TEXT,
              approved_at TEXT,
              created_at TEXT NOT NULL DEFAULT (datetime('now')),
              FOREIGN KEY (room_id) REFERENCES room(room_id)
            );

            CREATE INDEX IF NOT EXISTS idx_reservation_room_time
              ON room_reservation(room_id, starts_at, ends_at);
            CREATE INDEX IF NOT EXISTS idx_reservation_series
              ON room_reservation(series_id);
            "#,
        )?;
        Ok(())
    }

    /// 查找与候选区间冲突的占用态预约
    ///
    /// 只统计 PENDING/APPROVED; 左闭右开语义, 边界相接不算冲突
    pub fn find_conflicts(
        &self,
        room_id: &str,
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
    ) -> RepositoryResult<Vec<Reservation>> {
        let conn = self.get_conn()?;
        Self::query_conflicts(&conn, room_id, starts_at, ends_at, None)
    }

    /// 冲突查询（可排除指定预约自身, 供审批复查使用）
    fn query_conflicts(
        conn: &Connection,
        room_id: &str,
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
        exclude_id: Option<&str>,
    ) -> RepositoryResult<Vec<Reservation>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT reservation_id, room_id, starts_at, ends_at, status, purpose,
                   reserved_by, series_id, approved_by, approved_at, created_at
            FROM room_reservation
            WHERE room_id = ?1
              AND status IN ('PENDING', 'APPROVED')
              AND starts_at < ?2
              AND ends_at > ?3
              AND (?4 IS NULL OR reservation_id != ?4)
            ORDER BY starts_at ASC
            "#,
        )?;

        let rows = stmt
            .query_map(
                params![room_id, format_ts(ends_at), format_ts(starts_at), exclude_id],
                Self::map_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// 排他插入: 单事务内做冲突检查, 无冲突才写入
    ///
    /// # 返回
    /// - `Ok(Written)`: 无冲突, 已落库
    /// - `Ok(Blocked(conflicts))`: 存在冲突, 未写入
    pub fn insert_exclusive(
        &self,
        reservation: &Reservation,
    ) -> RepositoryResult<ExclusiveWriteOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let conflicts = Self::query_conflicts(
            &tx,
            &reservation.room_id,
            reservation.starts_at,
            reservation.ends_at,
            None,
        )?;
        if !conflicts.is_empty() {
            return Ok(ExclusiveWriteOutcome::Blocked(conflicts));
        }

        Self::insert_in_tx(&tx, reservation)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(ExclusiveWriteOutcome::Written)
    }

    fn insert_in_tx(conn: &Connection, reservation: &Reservation) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO room_reservation (
                reservation_id, room_id, starts_at, ends_at, status, purpose,
                reserved_by, series_id, approved_by, approved_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                reservation.reservation_id,
                reservation.room_id,
                format_ts(reservation.starts_at),
                format_ts(reservation.ends_at),
                reservation.status.to_string(),
                reservation.purpose,
                reservation.reserved_by,
                reservation.series_id,
                reservation.approved_by,
                reservation.approved_at.map(format_ts),
                reservation.created_at,
            ],
        )?;
        Ok(())
    }

    /// 排他审批: 单事务内复查冲突(排除自身)后置为 APPROVED
    ///
    /// 创建后到审批前, 同教室可能已有其他预约被批准, 因此审批必须复查
    ///
    /// # 返回
    /// - `Ok(Written)`: 已批准, 记录审批人与时间
    /// - `Ok(Blocked(conflicts))`: 存在冲突, 状态未变
    /// - `Err(NotFound)`: 预约不存在
    /// - `Err(InvalidStateTransition)`: 当前状态不是 PENDING
    pub fn approve_exclusive(
        &self,
        reservation_id: &str,
        approver: &str,
        approved_at: NaiveDateTime,
    ) -> RepositoryResult<ExclusiveWriteOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let reservation = Self::find_in_tx(&tx, reservation_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "Reservation".to_string(),
                id: reservation_id.to_string(),
            }
        })?;

        if reservation.status != ReservationStatus::Pending {
            return Err(RepositoryError::InvalidStateTransition {
                from: reservation.status.to_string(),
                to: ReservationStatus::Approved.to_string(),
            });
        }

        let conflicts = Self::query_conflicts(
            &tx,
            &reservation.room_id,
            reservation.starts_at,
            reservation.ends_at,
            Some(reservation_id),
        )?;
        if !conflicts.is_empty() {
            return Ok(ExclusiveWriteOutcome::Blocked(conflicts));
        }

        tx.execute(
            r#"
            UPDATE room_reservation
            SET status = 'APPROVED', approved_by = ?2, approved_at = ?3
            WHERE reservation_id = ?1
            "#,
            params![reservation_id, approver, format_ts(approved_at)],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(ExclusiveWriteOutcome::Written)
    }

    /// 带状态前置条件的状态更新（驳回/取消）
    ///
    /// # 返回
    /// - `Ok(true)`: 更新完成
    /// - `Ok(false)`: 当前状态不满足前置条件, 未更新
    pub fn update_status_guarded(
        &self,
        reservation_id: &str,
        expected: &[ReservationStatus],
        next: ReservationStatus,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let placeholders = expected
            .iter()
            .map(|s| format!("'{}'", s))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE room_reservation SET status = ?2 WHERE reservation_id = ?1 AND status IN ({})",
            placeholders
        );
        let affected = conn.execute(&sql, params![reservation_id, next.to_string()])?;
        Ok(affected > 0)
    }

    /// 按ID查找预约（缺失返回 None）
    pub fn find_by_id(&self, reservation_id: &str) -> RepositoryResult<Option<Reservation>> {
        let conn = self.get_conn()?;
        Self::find_in_tx(&conn, reservation_id)
    }

    fn find_in_tx(conn: &Connection, reservation_id: &str) -> RepositoryResult<Option<Reservation>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT reservation_id, room_id, starts_at, ends_at, status, purpose,
                   reserved_by, series_id, approved_by, approved_at, created_at
            FROM room_reservation
            WHERE reservation_id = ?1
            "#,
        )?;

        let result = stmt.query_row(params![reservation_id], Self::map_row);

        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 列出某教室的全部预约（按开始时间排序）
    pub fn list_by_room(&self, room_id: &str) -> RepositoryResult<Vec<Reservation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT reservation_id, room_id, starts_at, ends_at, status, purpose,
                   reserved_by, series_id, approved_by, approved_at, created_at
            FROM room_reservation
            WHERE room_id = ?1
            ORDER BY starts_at ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![room_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// 列出某周期序列的全部发生次（按开始时间排序）
    pub fn list_by_series(&self, series_id: &str) -> RepositoryResult<Vec<Reservation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT reservation_id, room_id, starts_at, ends_at, status, purpose,
                   reserved_by, series_id, approved_by, approved_at, created_at
            FROM room_reservation
            WHERE series_id = ?1
            ORDER BY starts_at ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![series_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// 行映射: room_reservation → Reservation
    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reservation> {
        let starts_at: String = row.get(2)?;
        let ends_at: String = row.get(3)?;
        let status_str: String = row.get(4)?;
        let approved_at: Option<String> = row.get(9)?;

        Ok(Reservation {
            reservation_id: row.get(0)?,
            room_id: row.get(1)?,
            starts_at: parse_ts(2, &starts_at)?,
            ends_at: parse_ts(3, &ends_at)?,
            status: ReservationStatus::from_str(&status_str).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    e.into(),
                )
            })?,
            purpose: row.get(5)?,
            reserved_by: row.get(6)?,
            series_id: row.get(7)?,
            approved_by: row.get(8)?,
            approved_at: match approved_at {
                Some(s) => Some(parse_ts(9, &s)?),
                None => None,
            },
            created_at: row.get(10)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn setup_test_repos() -> (RoomRepository, ReservationRepository, String) {
        let conn = open_sqlite_connection(":memory:").expect("Failed to open test db");
        let conn = Arc::new(Mutex::new(conn));
        let room_repo =
            RoomRepository::from_connection(conn.clone()).expect("Failed to create room repo");
        let reservation_repo = ReservationRepository::from_connection(conn)
            .expect("Failed to create reservation repo");

        let room = Room::new("主楼".to_string(), "101".to_string(), 60);
        room_repo.insert(&room).expect("Failed to insert room");

        (room_repo, reservation_repo, room.room_id)
    }

    fn reservation(room_id: &str, d: u32, from_h: u32, to_h: u32) -> Reservation {
        Reservation::new(
            room_id.to_string(),
            dt(d, from_h),
            dt(d, to_h),
            "讲座".to_string(),
            "t001".to_string(),
            None,
        )
    }

    #[test]
    fn test_insert_exclusive_blocks_overlap() {
        let (_, repo, room_id) = setup_test_repos();

        let first = reservation(&room_id, 2, 10, 12);
        match repo.insert_exclusive(&first).expect("Failed to insert") {
            ExclusiveWriteOutcome::Written => {}
            other => panic!("Expected Written, got {:?}", other),
        }

        // [11,13) 与 [10,12) 相交 → 被挡
        let overlapping = reservation(&room_id, 2, 11, 13);
        match repo
            .insert_exclusive(&overlapping)
            .expect("Failed to insert")
        {
            ExclusiveWriteOutcome::Blocked(conflicts) => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].reservation_id, first.reservation_id);
            }
            other => panic!("Expected Blocked, got {:?}", other),
        }
    }

    #[test]
    fn test_boundary_touch_is_not_conflict() {
        let (_, repo, room_id) = setup_test_repos();

        repo.insert_exclusive(&reservation(&room_id, 2, 10, 12))
            .expect("Failed to insert");

        // [12,13) 与 [10,12) 边界相接 → 放行
        match repo
            .insert_exclusive(&reservation(&room_id, 2, 12, 13))
            .expect("Failed to insert")
        {
            ExclusiveWriteOutcome::Written => {}
            other => panic!("Expected Written, got {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_reservation_does_not_block() {
        let (_, repo, room_id) = setup_test_repos();

        let first = reservation(&room_id, 2, 10, 12);
        repo.insert_exclusive(&first).expect("Failed to insert");
        repo.update_status_guarded(
            &first.reservation_id,
            &[ReservationStatus::Pending, ReservationStatus::Approved],
            ReservationStatus::Cancelled,
        )
        .expect("Failed to cancel");

        // 已取消的同时段预约不再占用
        match repo
            .insert_exclusive(&reservation(&room_id, 2, 10, 12))
            .expect("Failed to insert")
        {
            ExclusiveWriteOutcome::Written => {}
            other => panic!("Expected Written, got {:?}", other),
        }
    }

    #[test]
    fn test_approve_records_approver() {
        let (_, repo, room_id) = setup_test_repos();

        let r = reservation(&room_id, 2, 10, 12);
        repo.insert_exclusive(&r).expect("Failed to insert");

        match repo
            .approve_exclusive(&r.reservation_id, "admin", dt(1, 9))
            .expect("Failed to approve")
        {
            ExclusiveWriteOutcome::Written => {}
            other => panic!("Expected Written, got {:?}", other),
        }

        let found = repo
            .find_by_id(&r.reservation_id)
            .expect("Failed to find")
            .expect("Reservation not found");
        assert_eq!(found.status, ReservationStatus::Approved);
        assert_eq!(found.approved_by.as_deref(), Some("admin"));
        assert_eq!(found.approved_at, Some(dt(1, 9)));
    }

    #[test]
    fn test_approve_twice_is_state_error() {
        let (_, repo, room_id) = setup_test_repos();

        let r = reservation(&room_id, 2, 10, 12);
        repo.insert_exclusive(&r).expect("Failed to insert");
        repo.approve_exclusive(&r.reservation_id, "admin", dt(1, 9))
            .expect("Failed to approve");

        let result = repo.approve_exclusive(&r.reservation_id, "admin", dt(1, 10));
        assert!(matches!(
            result,
            Err(RepositoryError::InvalidStateTransition { .. })
        ));
    }
}

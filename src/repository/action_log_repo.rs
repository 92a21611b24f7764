// ==========================================
// 教务管理系统 - 操作日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
// 说明: 只追加不修改, 供审计追踪查询
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
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
            CREATE TABLE IF NOT EXISTS action_log (
              action_id TEXT PRIMARY KEY,
              action_type TEXT NOT NULL,
              action_ts TEXT NOT NULL,
              actor TEXT NOT NULL,
              entity_id TEXT,
              payload_json TEXT,
              detail TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_action_log_entity
              ON action_log(entity_id);
            CREATE INDEX IF NOT EXISTS idx_action_log_ts
              ON action_log(action_ts DESC);
            "#,
        )?;
        Ok(())
    }

    /// 插入操作日志
    ///
    /// # 返回
    /// - `Ok(action_id)`: 成功插入,返回action_id
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO action_log (
                action_id, action_type, action_ts, actor, entity_id, payload_json, detail
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                log.action_id,
                log.action_type.to_string(),
                log.action_ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                log.actor,
                log.entity_id,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.detail,
            ],
        )?;

        Ok(log.action_id.clone())
    }

    /// 查询最近的操作日志（按时间倒序）
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, action_type, action_ts, actor, entity_id, payload_json, detail
            FROM action_log
            ORDER BY action_ts DESC, action_id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt
            .query_map(params![limit as i64], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// 查询某实体相关的操作日志（按时间倒序）
    pub fn list_by_entity(&self, entity_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, action_type, action_ts, actor, entity_id, payload_json, detail
            FROM action_log
            WHERE entity_id = ?1
            ORDER BY action_ts DESC, action_id DESC
            "#,
        )?;

        let rows = stmt
            .query_map(params![entity_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// 行映射: action_log → ActionLog
    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActionLog> {
        let type_str: String = row.get(1)?;
        let ts_str: String = row.get(2)?;
        let payload: Option<String> = row.get(5)?;

        let action_type = match type_str.as_str() {
            "ADD_PREREQUISITE" => ActionType::AddPrerequisite,
            "REMOVE_PREREQUISITE" => ActionType::RemovePrerequisite,
            "APPROVE_RESERVATION" => ActionType::ApproveReservation,
            "REJECT_RESERVATION" => ActionType::RejectReservation,
            "CANCEL_RESERVATION" => ActionType::CancelReservation,
            "REPLACE_GRADE_SCHEME" => ActionType::ReplaceGradeScheme,
            other => {
                return Err(rusqlite::Error::FromSqlConversionFailure(
                    1,
                    rusqlite::types::Type::Text,
                    format!("未知的操作类型: {}", other).into(),
                ))
            }
        };

        Ok(ActionLog {
            action_id: row.get(0)?,
            action_type,
            action_ts: NaiveDateTime::parse_from_str(&ts_str, "%Y-%m-%d %H:%M:%S").map_err(
                |e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                },
            )?,
            actor: row.get(3)?,
            entity_id: row.get(4)?,
            payload_json: match payload {
                Some(s) => Some(serde_json::from_str(&s).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?),
                None => None,
            },
            detail: row.get(6)?,
        })
    }
}

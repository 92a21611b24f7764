// ==========================================
// 教务管理系统 - 先修关系仓储
// ==========================================
// 职责: 管理 prerequisite_edge 表 (课程依赖有向边)
// 约束: (course_id, prereq_course_id) 复合主键,
//       重复插入由存储层直接拦截, 不依赖"先查后写"
// 红线: Repository 不做环检测, 环检测属于服务层
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::course::PrerequisiteEdge;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct PrerequisiteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PrerequisiteRepository {
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
            CREATE TABLE IF NOT EXISTS prerequisite_edge (
              course_id TEXT NOT NULL,
              prereq_course_id TEXT NOT NULL,
              created_at TEXT NOT NULL DEFAULT (datetime('now')),
              created_by TEXT NOT NULL,
              PRIMARY KEY (course_id, prereq_course_id),
              FOREIGN KEY (course_id) REFERENCES course(course_id),
              FOREIGN KEY (prereq_course_id) REFERENCES course(course_id)
            );

            CREATE INDEX IF NOT EXISTS idx_prerequisite_prereq
              ON prerequisite_edge(prereq_course_id);
            "#,
        )?;
        Ok(())
    }

    /// 插入先修边
    pub fn insert(&self, edge: &PrerequisiteEdge) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO prerequisite_edge (course_id, prereq_course_id, created_at, created_by)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                edge.course_id,
                edge.prereq_course_id,
                edge.created_at,
                edge.created_by,
            ],
        )?;
        Ok(())
    }

    /// 边是否已存在
    pub fn exists(&self, course_id: &str, prereq_course_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM prerequisite_edge WHERE course_id = ?1 AND prereq_course_id = ?2",
            params![course_id, prereq_course_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// 列出某课程的直接先修课程ID（DFS 遍历用）
    pub fn list_prereq_ids(&self, course_id: &str) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT prereq_course_id FROM prerequisite_edge WHERE course_id = ?1",
        )?;

        let rows = stmt
            .query_map(params![course_id], |row| row.get::<_, String>(0))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// 列出某课程的全部先修边
    pub fn list_by_course(&self, course_id: &str) -> RepositoryResult<Vec<PrerequisiteEdge>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT course_id, prereq_course_id, created_at, created_by
            FROM prerequisite_edge
            WHERE course_id = ?1
            ORDER BY prereq_course_id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![course_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// 列出以某课程为先修的全部边（反向查询: 哪些课程依赖它）
    pub fn list_by_prereq(&self, prereq_course_id: &str) -> RepositoryResult<Vec<PrerequisiteEdge>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT course_id, prereq_course_id, created_at, created_by
            FROM prerequisite_edge
            WHERE prereq_course_id = ?1
            ORDER BY course_id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![prereq_course_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// 删除先修边（无条件删除, 删除不会引入环, 无需重新校验）
    pub fn delete(&self, course_id: &str, prereq_course_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM prerequisite_edge WHERE course_id = ?1 AND prereq_course_id = ?2",
            params![course_id, prereq_course_id],
        )?;
        Ok(affected)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PrerequisiteEdge> {
        Ok(PrerequisiteEdge {
            course_id: row.get(0)?,
            prereq_course_id: row.get(1)?,
            created_at: row.get(2)?,
            created_by: row.get(3)?,
        })
    }
}

// ==========================================
// 教务管理系统 - 课程仓储
// ==========================================
// 职责: 课程主数据的查找/保存
// 说明: 薄协作仓储, 按ID查找缺失时返回 None 而非错误
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::course::Course;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct CourseRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CourseRepository {
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
            CREATE TABLE IF NOT EXISTS course (
              course_id TEXT PRIMARY KEY,
              code TEXT NOT NULL UNIQUE,
              title TEXT NOT NULL,
              credits REAL NOT NULL,
              created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_course_code ON course(code);
            "#,
        )?;
        Ok(())
    }

    /// 保存课程
    pub fn insert(&self, course: &Course) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO course (course_id, code, title, credits, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                course.course_id,
                course.code,
                course.title,
                course.credits,
                course.created_at,
            ],
        )?;
        Ok(())
    }

    /// 按ID查找课程（缺失返回 None）
    pub fn find_by_id(&self, course_id: &str) -> RepositoryResult<Option<Course>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT course_id, code, title, credits, created_at FROM course WHERE course_id = ?1",
        )?;

        let result = stmt.query_row(params![course_id], Self::map_row);

        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 课程是否存在
    pub fn exists(&self, course_id: &str) -> RepositoryResult<bool> {
        Ok(self.find_by_id(course_id)?.is_some())
    }

    /// 列出全部课程（按课程代码排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<Course>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT course_id, code, title, credits, created_at FROM course ORDER BY code ASC",
        )?;

        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Course> {
        Ok(Course {
            course_id: row.get(0)?,
            code: row.get(1)?,
            title: row.get(2)?,
            credits: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

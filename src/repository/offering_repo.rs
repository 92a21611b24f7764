// ==========================================
// 教务管理系统 - 开课与成绩构成仓储
// ==========================================
// 职责: 管理 course_offering 表与 grade_component 表
// 说明: 成绩构成为持久化的按开课记录, 整体替换在单事务内完成
//       (删除旧构成 + 写入新构成), 进程内不再持有可变缓存
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::offering::{CourseOffering, GradeComponent};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// OfferingRepository - 开课仓储
// ==========================================
pub struct OfferingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OfferingRepository {
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
            CREATE TABLE IF NOT EXISTS course_offering (
              offering_id TEXT PRIMARY KEY,
              course_id TEXT NOT NULL,
              term TEXT NOT NULL,
              instructor TEXT NOT NULL,
              created_at TEXT NOT NULL DEFAULT (datetime('now')),
              FOREIGN KEY (course_id) REFERENCES course(course_id),
              UNIQUE(course_id, term)
            );

            CREATE INDEX IF NOT EXISTS idx_offering_course
              ON course_offering(course_id);
            "#,
        )?;
        Ok(())
    }

    /// 保存开课
    pub fn insert(&self, offering: &CourseOffering) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO course_offering (offering_id, course_id, term, instructor, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                offering.offering_id,
                offering.course_id,
                offering.term,
                offering.instructor,
                offering.created_at,
            ],
        )?;
        Ok(())
    }

    /// 按ID查找开课（缺失返回 None）
    pub fn find_by_id(&self, offering_id: &str) -> RepositoryResult<Option<CourseOffering>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT offering_id, course_id, term, instructor, created_at
            FROM course_offering
            WHERE offering_id = ?1
            "#,
        )?;

        let result = stmt.query_row(params![offering_id], |row| {
            Ok(CourseOffering {
                offering_id: row.get(0)?,
                course_id: row.get(1)?,
                term: row.get(2)?,
                instructor: row.get(3)?,
                created_at: row.get(4)?,
            })
        });

        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 开课是否存在
    pub fn exists(&self, offering_id: &str) -> RepositoryResult<bool> {
        Ok(self.find_by_id(offering_id)?.is_some())
    }
}

// ==========================================
// GradeComponentRepository - 成绩构成仓储
// ==========================================
// 红线: Repository 不校验权重和, 权重校验属于服务层
pub struct GradeComponentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl GradeComponentRepository {
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
            CREATE TABLE IF NOT EXISTS grade_component (
              offering_id TEXT NOT NULL,
              name TEXT NOT NULL,
              weight REAL,
              position INTEGER NOT NULL,
              PRIMARY KEY (offering_id, name),
              FOREIGN KEY (offering_id) REFERENCES course_offering(offering_id)
            );
            "#,
        )?;
        Ok(())
    }

    /// 整体替换某开课的成绩构成（单事务: 删旧 + 写新）
    pub fn replace_all(
        &self,
        offering_id: &str,
        components: &[GradeComponent],
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tx.execute(
            "DELETE FROM grade_component WHERE offering_id = ?1",
            params![offering_id],
        )?;

        for component in components {
            tx.execute(
                r#"
                INSERT INTO grade_component (offering_id, name, weight, position)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![
                    component.offering_id,
                    component.name,
                    component.weight,
                    component.position,
                ],
            )?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    /// 列出某开课的全部构成项（按配置顺序）
    pub fn list_by_offering(&self, offering_id: &str) -> RepositoryResult<Vec<GradeComponent>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT offering_id, name, weight, position
            FROM grade_component
            WHERE offering_id = ?1
            ORDER BY position ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![offering_id], |row| {
                Ok(GradeComponent {
                    offering_id: row.get(0)?,
                    name: row.get(1)?,
                    weight: row.get(2)?,
                    position: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }
}

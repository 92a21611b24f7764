// ==========================================
// 教务管理系统 - 扩展属性仓储
// ==========================================
// 职责: 管理 attribute_def (属性目录) 与 attribute_value (稀疏值表)
// 约束: attribute_def 按 (entity_kind, name) 唯一;
//       attribute_value 按 (entity_id, attr_id) 唯一,
//       写入使用 ON CONFLICT 原子覆盖, 不依赖"先查后写"
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::attribute::{AttributeDefinition, AttributeValue};
use crate::domain::types::{AttributeValueType, EntityKind};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// AttributeDefinitionRepository - 属性目录仓储
// ==========================================
pub struct AttributeDefinitionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AttributeDefinitionRepository {
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
            CREATE TABLE IF NOT EXISTS attribute_def (
              attr_id TEXT PRIMARY KEY,
              entity_kind TEXT NOT NULL,
              name TEXT NOT NULL,
              value_type TEXT NOT NULL,
              max_length INTEGER,
              description TEXT,
              created_at TEXT NOT NULL DEFAULT (datetime('now')),
              UNIQUE(entity_kind, name)
            );

            CREATE INDEX IF NOT EXISTS idx_attribute_def_name
              ON attribute_def(name);
            "#,
        )?;
        Ok(())
    }

    /// 插入新的属性定义
    ///
    /// (entity_kind, name) 重复时由唯一索引拦截, 返回唯一约束错误
    pub fn insert(&self, def: &AttributeDefinition) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO attribute_def (
                attr_id, entity_kind, name, value_type,
                max_length, description, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                def.attr_id,
                def.entity_kind.to_string(),
                def.name,
                def.value_type.to_string(),
                def.max_length.map(|v| v as i64),
                def.description,
                def.created_at,
            ],
        )?;
        Ok(())
    }

    /// 按 (实体类别, 属性名) 查找定义
    pub fn find_by_kind_and_name(
        &self,
        entity_kind: EntityKind,
        name: &str,
    ) -> RepositoryResult<Option<AttributeDefinition>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT attr_id, entity_kind, name, value_type, max_length, description, created_at
            FROM attribute_def
            WHERE entity_kind = ?1 AND name = ?2
            "#,
        )?;

        let result = stmt.query_row(params![entity_kind.to_string(), name], Self::map_row);

        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按属性名查找全部定义（跨实体类别, 用于同名冲突检查）
    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Vec<AttributeDefinition>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT attr_id, entity_kind, name, value_type, max_length, description, created_at
            FROM attribute_def
            WHERE name = ?1
            ORDER BY entity_kind ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![name], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// 按定义ID查找
    pub fn find_by_id(&self, attr_id: &str) -> RepositoryResult<Option<AttributeDefinition>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT attr_id, entity_kind, name, value_type, max_length, description, created_at
            FROM attribute_def
            WHERE attr_id = ?1
            "#,
        )?;

        let result = stmt.query_row(params![attr_id], Self::map_row);

        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 列出某实体类别的全部定义（按属性名排序）
    pub fn list_by_kind(&self, entity_kind: EntityKind) -> RepositoryResult<Vec<AttributeDefinition>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT attr_id, entity_kind, name, value_type, max_length, description, created_at
            FROM attribute_def
            WHERE entity_kind = ?1
            ORDER BY name ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![entity_kind.to_string()], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// 行映射: attribute_def → AttributeDefinition
    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttributeDefinition> {
        let kind_str: String = row.get(1)?;
        let type_str: String = row.get(3)?;
        let max_length: Option<i64> = row.get(4)?;

        Ok(AttributeDefinition {
            attr_id: row.get(0)?,
            entity_kind: EntityKind::from_str(&kind_str).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    1,
                    rusqlite::types::Type::Text,
                    e.into(),
                )
            })?,
            name: row.get(2)?,
            value_type: AttributeValueType::from_str(&type_str).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    e.into(),
                )
            })?,
            max_length: max_length.map(|v| v as usize),
            description: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

// ==========================================
// AttributeValueRepository - 属性值仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct AttributeValueRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AttributeValueRepository {
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
            CREATE TABLE IF NOT EXISTS attribute_value (
              value_id TEXT PRIMARY KEY,
              entity_id TEXT NOT NULL,
              attr_id TEXT NOT NULL,
              raw_value TEXT NOT NULL,
              updated_at TEXT NOT NULL DEFAULT (datetime('now')),
              FOREIGN KEY (attr_id) REFERENCES attribute_def(attr_id),
              UNIQUE(entity_id, attr_id)
            );

            CREATE INDEX IF NOT EXISTS idx_attribute_value_entity
              ON attribute_value(entity_id);
            "#,
        )?;
        Ok(())
    }

    /// 写入属性值（Upsert 操作）
    ///
    /// (entity_id, attr_id) 已存在时原子覆盖旧值, 不产生重复行
    pub fn upsert(&self, value: &AttributeValue) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO attribute_value (
                value_id, entity_id, attr_id, raw_value, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(entity_id, attr_id) DO UPDATE SET
                raw_value = excluded.raw_value,
                updated_at = excluded.updated_at
            "#,
            params![
                value.value_id,
                value.entity_id,
                value.attr_id,
                value.raw_value,
                value.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 按 (实体, 定义) 查找单个值
    pub fn find_by_entity_and_attr(
        &self,
        entity_id: &str,
        attr_id: &str,
    ) -> RepositoryResult<Option<AttributeValue>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT value_id, entity_id, attr_id, raw_value, updated_at
            FROM attribute_value
            WHERE entity_id = ?1 AND attr_id = ?2
            "#,
        )?;

        let result = stmt.query_row(params![entity_id, attr_id], |row| {
            Ok(AttributeValue {
                value_id: row.get(0)?,
                entity_id: row.get(1)?,
                attr_id: row.get(2)?,
                raw_value: row.get(3)?,
                updated_at: row.get(4)?,
            })
        });

        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 列出实体的全部 (属性名, 原始值) 对
    ///
    /// 未设置的属性不出现在结果中; 无任何值的实体返回空列表
    pub fn list_named_values(&self, entity_id: &str) -> RepositoryResult<Vec<(String, String)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT d.name, v.raw_value
            FROM attribute_value v
            JOIN attribute_def d ON d.attr_id = v.attr_id
            WHERE v.entity_id = ?1
            ORDER BY d.name ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![entity_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// 统计 (实体, 定义) 对应的行数（用于唯一性校验）
    pub fn count_for_pair(&self, entity_id: &str, attr_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM attribute_value WHERE entity_id = ?1 AND attr_id = ?2",
            params![entity_id, attr_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 删除单个属性值
    pub fn delete_by_entity_and_attr(
        &self,
        entity_id: &str,
        attr_id: &str,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM attribute_value WHERE entity_id = ?1 AND attr_id = ?2",
            params![entity_id, attr_id],
        )?;
        Ok(affected)
    }
}

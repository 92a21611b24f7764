// ==========================================
// 教务管理系统 - 配置管理器
// ==========================================
// 职责: 系统级配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value)
// 说明: 所有键都有代码内默认值, 表中仅存放覆写项
// ==========================================

use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键与默认值
// ==========================================

/// 周期性预约单次展开的最大发生次数
pub const KEY_RESERVATION_MAX_OCCURRENCES: &str = "reservation.max_occurrences";
pub const DEFAULT_RESERVATION_MAX_OCCURRENCES: usize = 52;

/// 属性原始值长度上限（定义未声明 max_length 时的兜底值）
pub const KEY_ATTRIBUTE_MAX_VALUE_LEN: &str = "attribute.max_value_len";
pub const DEFAULT_ATTRIBUTE_MAX_VALUE_LEN: usize = 4000;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        let manager = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        manager.ensure_table()?;
        Ok(manager)
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let manager = Self { conn };
        manager.ensure_table()?;
        Ok(manager)
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
            CREATE TABLE IF NOT EXISTS config_kv (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL,
              updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }

    /// 读取字符串配置（无覆写返回 None）
    pub fn get_string(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT value FROM config_kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));

        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 写入配置覆写（Upsert 操作）
    pub fn set_string(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let now = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value, now],
        )?;
        Ok(())
    }

    /// 读取非负整数配置, 覆写缺失或不合法时回落默认值
    pub fn get_usize_or(&self, key: &str, default: usize) -> RepositoryResult<usize> {
        match self.get_string(key)? {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!("配置{}的覆写值不合法: {}, 回落默认值{}", key, raw, default);
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }

    /// 周期性预约单次展开的最大发生次数
    pub fn reservation_max_occurrences(&self) -> RepositoryResult<usize> {
        self.get_usize_or(
            KEY_RESERVATION_MAX_OCCURRENCES,
            DEFAULT_RESERVATION_MAX_OCCURRENCES,
        )
    }

    /// 属性原始值长度上限
    pub fn attribute_max_value_len(&self) -> RepositoryResult<usize> {
        self.get_usize_or(KEY_ATTRIBUTE_MAX_VALUE_LEN, DEFAULT_ATTRIBUTE_MAX_VALUE_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_when_unset() {
        let manager = ConfigManager::new(":memory:").expect("Failed to create manager");
        assert_eq!(
            manager
                .reservation_max_occurrences()
                .expect("Failed to get"),
            DEFAULT_RESERVATION_MAX_OCCURRENCES
        );
    }

    #[test]
    fn test_set_and_get_override() {
        let manager = ConfigManager::new(":memory:").expect("Failed to create manager");

        manager
            .set_string(KEY_RESERVATION_MAX_OCCURRENCES, "16")
            .expect("Failed to set");
        assert_eq!(
            manager
                .reservation_max_occurrences()
                .expect("Failed to get"),
            16
        );

        // 覆写可再次更新
        manager
            .set_string(KEY_RESERVATION_MAX_OCCURRENCES, "8")
            .expect("Failed to set");
        assert_eq!(
            manager
                .reservation_max_occurrences()
                .expect("Failed to get"),
            8
        );
    }

    #[test]
    fn test_invalid_override_falls_back() {
        let manager = ConfigManager::new(":memory:").expect("Failed to create manager");
        manager
            .set_string(KEY_ATTRIBUTE_MAX_VALUE_LEN, "not-a-number")
            .expect("Failed to set");
        assert_eq!(
            manager.attribute_max_value_len().expect("Failed to get"),
            DEFAULT_ATTRIBUTE_MAX_VALUE_LEN
        );
    }
}

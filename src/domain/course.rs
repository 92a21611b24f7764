// ==========================================
// 教务管理系统 - 课程领域模型
// ==========================================
// 职责: 课程主数据与先修关系边
// 红线: 先修关系全图必须保持无环 (DAG)
// ==========================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// Course - 课程
// ==========================================
// 薄协作实体: 仅提供按ID查找/保存, 供存在性检查使用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub course_id: String,  // 课程ID (UUID)
    pub code: String,       // 课程代码 (如 CS101)
    pub title: String,      // 课程名称
    pub credits: f64,       // 学分
    pub created_at: String, // 创建时间
}

impl Course {
    /// 创建新课程（自动生成 UUID 和时间戳）
    pub fn new(code: String, title: String, credits: f64) -> Self {
        let now = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        Self {
            course_id: Uuid::new_v4().to_string(),
            code,
            title,
            credits,
            created_at: now,
        }
    }
}

// ==========================================
// PrerequisiteEdge - 先修关系边
// ==========================================
// 语义: course_id 的修读要求先完成 prereq_course_id
// 约束: 无自环; 插入任一边后全图仍无环
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrerequisiteEdge {
    pub course_id: String,        // 课程ID
    pub prereq_course_id: String, // 先修课程ID
    pub created_at: String,       // 创建时间
    pub created_by: String,       // 创建人
}

impl PrerequisiteEdge {
    /// 创建新的先修边（自动生成时间戳）
    pub fn new(course_id: String, prereq_course_id: String, created_by: String) -> Self {
        let now = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        Self {
            course_id,
            prereq_course_id,
            created_at: now,
            created_by,
        }
    }
}

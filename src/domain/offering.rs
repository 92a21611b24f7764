// ==========================================
// 教务管理系统 - 开课与成绩构成领域模型
// ==========================================
// 职责: 开课(课程+学期)主数据、成绩构成配置、等级换算
// 红线: 已设权重之和不得超过 100
// ==========================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// CourseOffering - 开课
// ==========================================
// 薄协作实体: 仅提供按ID查找/保存, 供存在性检查使用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseOffering {
    pub offering_id: String, // 开课ID (UUID)
    pub course_id: String,   // 课程ID
    pub term: String,        // 学期 (如 2026-FALL)
    pub instructor: String,  // 授课教师
    pub created_at: String,  // 创建时间
}

impl CourseOffering {
    /// 创建新开课（自动生成 UUID 和时间戳）
    pub fn new(course_id: String, term: String, instructor: String) -> Self {
        let now = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        Self {
            offering_id: Uuid::new_v4().to_string(),
            course_id,
            term,
            instructor,
            created_at: now,
        }
    }
}

// ==========================================
// GradeComponent - 成绩构成项
// ==========================================
// 约束: (offering_id, name) 唯一; weight 为空表示暂未定权
// 说明: 配置为整体替换语义, 不做增量合并
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeComponent {
    pub offering_id: String, // 开课ID
    pub name: String,        // 构成项名称 (如 midterm / final)
    pub weight: Option<f64>, // 权重 (0-100, 可空)
    pub position: i32,       // 展示顺序
}

// ==========================================
// 等级换算
// ==========================================

/// 将百分制总评换算为等级
///
/// 阈值阶梯, 每档下界含等:
/// ≥93→A+, ≥90→A, ≥87→A-, ≥83→B+, ≥80→B, ≥77→B-,
/// ≥73→C+, ≥70→C, ≥67→C-, ≥63→D+, ≥60→D, 其余→F
pub fn letter_grade(total: f64) -> &'static str {
    if total >= 93.0 {
        "A+"
    } else if total >= 90.0 {
        "A"
    } else if total >= 87.0 {
        "A-"
    } else if total >= 83.0 {
        "B+"
    } else if total >= 80.0 {
        "B"
    } else if total >= 77.0 {
        "B-"
    } else if total >= 73.0 {
        "C+"
    } else if total >= 70.0 {
        "C"
    } else if total >= 67.0 {
        "C-"
    } else if total >= 63.0 {
        "D+"
    } else if total >= 60.0 {
        "D"
    } else {
        "F"
    }
}

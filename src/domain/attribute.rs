// ==========================================
// 教务管理系统 - 扩展属性领域模型
// ==========================================
// 职责: 定义属性目录与属性值实体 (EAV)
// 说明: 固定表结构无法预置所有策略性字段(迟交扣分比例、
//       查重开关、选择题选项列表等), 以 (实体, 属性名, 值)
//       行的方式挂载, 避免频繁改表
// ==========================================

use crate::domain::types::{AttributeValueType, EntityKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// AttributeDefinition - 属性定义
// ==========================================
// 约束: (entity_kind, name) 全局唯一; 创建后不再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub attr_id: String,               // 定义ID (UUID)
    pub entity_kind: EntityKind,       // 所属实体类别
    pub name: String,                  // 属性名 (类别内唯一)
    pub value_type: AttributeValueType, // 声明的值类型
    pub max_length: Option<usize>,     // 原始值最大长度 (可选)
    pub description: Option<String>,   // 属性说明 (可选)
    pub created_at: String,            // 创建时间
}

impl AttributeDefinition {
    /// 创建新的属性定义（自动生成 UUID 和时间戳）
    pub fn new(
        entity_kind: EntityKind,
        name: String,
        value_type: AttributeValueType,
        max_length: Option<usize>,
        description: Option<String>,
    ) -> Self {
        let now = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        Self {
            attr_id: Uuid::new_v4().to_string(),
            entity_kind,
            name,
            value_type,
            max_length,
            description,
            created_at: now,
        }
    }
}

// ==========================================
// AttributeValue - 属性值
// ==========================================
// 约束: 每个 (entity_id, attr_id) 至多一行, 由存储层唯一索引保证
// 说明: 值一律以原始字符串落库, 类型解释由门面层按声明类型完成
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeValue {
    pub value_id: String,   // 值ID (UUID)
    pub entity_id: String,  // 所属实体ID
    pub attr_id: String,    // 属性定义ID
    pub raw_value: String,  // 原始字符串值
    pub updated_at: String, // 最近写入时间
}

impl AttributeValue {
    /// 创建新的属性值（自动生成 UUID 和时间戳）
    pub fn new(entity_id: String, attr_id: String, raw_value: String) -> Self {
        let now = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        Self {
            value_id: Uuid::new_v4().to_string(),
            entity_id,
            attr_id,
            raw_value,
            updated_at: now,
        }
    }
}

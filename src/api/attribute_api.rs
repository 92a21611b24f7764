// ==========================================
// 教务管理系统 - 扩展属性门面 API
// ==========================================
// 职责: 属性定义注册、类型校验写入、批量读取、类型化访问
// 约定: 属性名必须先注册后使用, 不做"首次写入静默建定义";
//       写入值必须能按声明类型解析, 否则拒绝
// ==========================================

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::attribute::{AttributeDefinition, AttributeValue};
use crate::domain::types::{AttributeValueType, EntityKind};
use crate::repository::attribute_repo::{AttributeDefinitionRepository, AttributeValueRepository};

// ==========================================
// AttributeApi - 扩展属性门面
// ==========================================

/// 扩展属性门面API
///
/// 职责：
/// 1. 属性定义注册与查询
/// 2. 按声明类型校验后写入属性值
/// 3. 按实体批量读取属性
/// 4. 类型化读取 (int/decimal/bool/json)
pub struct AttributeApi {
    def_repo: Arc<AttributeDefinitionRepository>,
    value_repo: Arc<AttributeValueRepository>,
    config: Arc<ConfigManager>,
}

impl AttributeApi {
    /// 创建新的AttributeApi实例
    pub fn new(
        def_repo: Arc<AttributeDefinitionRepository>,
        value_repo: Arc<AttributeValueRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            def_repo,
            value_repo,
            config,
        }
    }

    // ==========================================
    // 属性定义
    // ==========================================

    /// 注册属性定义
    ///
    /// # 参数
    /// - entity_kind: 实体类别
    /// - name: 属性名 (类别内唯一)
    /// - value_type: 声明的值类型
    /// - max_length: 原始值最大长度 (可选)
    /// - description: 属性说明 (可选)
    ///
    /// # 返回
    /// - Ok(AttributeDefinition): 注册成功
    /// - Err(ApiError): 名称为空、类别内重名
    pub fn register_definition(
        &self,
        entity_kind: EntityKind,
        name: &str,
        value_type: AttributeValueType,
        max_length: Option<usize>,
        description: Option<String>,
    ) -> ApiResult<AttributeDefinition> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidInput("属性名不能为空".to_string()));
        }

        if self
            .def_repo
            .find_by_kind_and_name(entity_kind, name)?
            .is_some()
        {
            return Err(ApiError::BusinessRuleViolation(format!(
                "属性{}在类别{}下已注册",
                name, entity_kind
            )));
        }

        let def = AttributeDefinition::new(
            entity_kind,
            name.to_string(),
            value_type,
            max_length,
            description,
        );
        self.def_repo.insert(&def)?;

        tracing::info!(
            "注册属性定义: kind={} name={} type={}",
            entity_kind,
            name,
            value_type
        );
        Ok(def)
    }

    /// 列出某实体类别的全部属性定义
    pub fn list_definitions(&self, entity_kind: EntityKind) -> ApiResult<Vec<AttributeDefinition>> {
        Ok(self.def_repo.list_by_kind(entity_kind)?)
    }

    // ==========================================
    // 属性值读写
    // ==========================================

    /// 读取实体的全部属性 (属性名 → 原始值)
    ///
    /// 未设置的属性不注入默认值; 无任何值的实体返回空表, 不报错
    pub fn get_attributes(&self, entity_id: &str) -> ApiResult<HashMap<String, String>> {
        if entity_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("实体ID不能为空".to_string()));
        }

        let values = self.value_repo.list_named_values(entity_id)?;
        Ok(values.into_iter().collect())
    }

    /// 写入属性值
    ///
    /// # 参数
    /// - entity_kind: 实体类别
    /// - entity_id: 实体ID
    /// - name: 属性名
    /// - raw_value: 原始字符串值
    ///
    /// # 返回
    /// - Ok(()): 写入成功 (已存在则覆盖)
    /// - Err(NotFound): 属性未注册
    /// - Err(BusinessRuleViolation): 属性名属于其他实体类别 (数据完整性)
    /// - Err(ValidationError): 值不符合声明类型或超长
    pub fn set_attribute(
        &self,
        entity_kind: EntityKind,
        entity_id: &str,
        name: &str,
        raw_value: &str,
    ) -> ApiResult<()> {
        if entity_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("实体ID不能为空".to_string()));
        }

        let def = self.resolve_definition(entity_kind, name)?;
        self.validate_raw_value(&def, raw_value)?;

        let value = AttributeValue::new(
            entity_id.to_string(),
            def.attr_id.clone(),
            raw_value.to_string(),
        );
        self.value_repo.upsert(&value)?;

        tracing::debug!(
            "写入属性: kind={} entity={} name={}",
            entity_kind,
            entity_id,
            name
        );
        Ok(())
    }

    /// 删除属性值
    ///
    /// # 返回
    /// - Ok(true): 已删除
    /// - Ok(false): 实体上本就未设置该属性
    pub fn remove_attribute(
        &self,
        entity_kind: EntityKind,
        entity_id: &str,
        name: &str,
    ) -> ApiResult<bool> {
        let def = self.resolve_definition(entity_kind, name)?;
        let affected = self
            .value_repo
            .delete_by_entity_and_attr(entity_id, &def.attr_id)?;
        Ok(affected > 0)
    }

    // ==========================================
    // 类型化访问
    // ==========================================
    // 值以字符串落库, 调用方不应手工解析; 统一经由此处按声明类型读取

    /// 读取文本属性
    pub fn get_text(
        &self,
        entity_kind: EntityKind,
        entity_id: &str,
        name: &str,
    ) -> ApiResult<Option<String>> {
        self.get_typed_raw(entity_kind, entity_id, name, AttributeValueType::Text)
    }

    /// 读取整数属性
    pub fn get_int(
        &self,
        entity_kind: EntityKind,
        entity_id: &str,
        name: &str,
    ) -> ApiResult<Option<i64>> {
        let raw = self.get_typed_raw(entity_kind, entity_id, name, AttributeValueType::Int)?;
        raw.map(|s| {
            s.trim().parse::<i64>().map_err(|_| {
                ApiError::ValidationError(format!("属性{}存储值不是合法整数: {}", name, s))
            })
        })
        .transpose()
    }

    /// 读取小数属性
    pub fn get_decimal(
        &self,
        entity_kind: EntityKind,
        entity_id: &str,
        name: &str,
    ) -> ApiResult<Option<f64>> {
        let raw = self.get_typed_raw(entity_kind, entity_id, name, AttributeValueType::Decimal)?;
        raw.map(|s| {
            s.trim().parse::<f64>().map_err(|_| {
                ApiError::ValidationError(format!("属性{}存储值不是合法小数: {}", name, s))
            })
        })
        .transpose()
    }

    /// 读取布尔属性 (true/false, 不区分大小写)
    pub fn get_bool(
        &self,
        entity_kind: EntityKind,
        entity_id: &str,
        name: &str,
    ) -> ApiResult<Option<bool>> {
        let raw = self.get_typed_raw(entity_kind, entity_id, name, AttributeValueType::Bool)?;
        raw.map(|s| match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ApiError::ValidationError(format!(
                "属性{}存储值不是合法布尔: {}",
                name, s
            ))),
        })
        .transpose()
    }

    /// 读取JSON属性
    pub fn get_json(
        &self,
        entity_kind: EntityKind,
        entity_id: &str,
        name: &str,
    ) -> ApiResult<Option<JsonValue>> {
        let raw = self.get_typed_raw(entity_kind, entity_id, name, AttributeValueType::Json)?;
        raw.map(|s| {
            serde_json::from_str(&s).map_err(|e| {
                ApiError::ValidationError(format!("属性{}存储值不是合法JSON: {}", name, e))
            })
        })
        .transpose()
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 解析属性定义, 含跨类别同名冲突检查
    fn resolve_definition(
        &self,
        entity_kind: EntityKind,
        name: &str,
    ) -> ApiResult<AttributeDefinition> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidInput("属性名不能为空".to_string()));
        }

        if let Some(def) = self.def_repo.find_by_kind_and_name(entity_kind, name)? {
            return Ok(def);
        }

        // 同名定义存在但挂在其他实体类别下 → 数据完整性错误, 与"未注册"区分开
        let others = self.def_repo.find_by_name(name)?;
        if let Some(other) = others.first() {
            return Err(ApiError::BusinessRuleViolation(format!(
                "属性{}属于实体类别{}, 不能用于{}",
                name, other.entity_kind, entity_kind
            )));
        }

        Err(ApiError::NotFound(format!(
            "属性定义不存在: kind={} name={}",
            entity_kind, name
        )))
    }

    /// 按声明类型校验原始值
    ///
    /// 长度上限优先取定义声明的 max_length, 未声明时用系统级兜底值
    fn validate_raw_value(&self, def: &AttributeDefinition, raw_value: &str) -> ApiResult<()> {
        let max_length = match def.max_length {
            Some(v) => v,
            None => self.config.attribute_max_value_len()?,
        };
        if raw_value.chars().count() > max_length {
            return Err(ApiError::ValidationError(format!(
                "属性{}超长: {} > {}",
                def.name,
                raw_value.chars().count(),
                max_length
            )));
        }

        match def.value_type {
            AttributeValueType::Text => Ok(()),
            AttributeValueType::Int => raw_value
                .trim()
                .parse::<i64>()
                .map(|_| ())
                .map_err(|_| {
                    ApiError::ValidationError(format!(
                        "属性{}要求整数, 收到: {}",
                        def.name, raw_value
                    ))
                }),
            AttributeValueType::Decimal => raw_value
                .trim()
                .parse::<f64>()
                .map(|_| ())
                .map_err(|_| {
                    ApiError::ValidationError(format!(
                        "属性{}要求小数, 收到: {}",
                        def.name, raw_value
                    ))
                }),
            AttributeValueType::Bool => {
                match raw_value.trim().to_ascii_lowercase().as_str() {
                    "true" | "false" => Ok(()),
                    _ => Err(ApiError::ValidationError(format!(
                        "属性{}要求布尔(true/false), 收到: {}",
                        def.name, raw_value
                    ))),
                }
            }
            AttributeValueType::Json => serde_json::from_str::<JsonValue>(raw_value)
                .map(|_| ())
                .map_err(|e| {
                    ApiError::ValidationError(format!("属性{}要求JSON: {}", def.name, e))
                }),
        }
    }

    /// 读取单个属性原始值, 校验声明类型与请求类型一致
    fn get_typed_raw(
        &self,
        entity_kind: EntityKind,
        entity_id: &str,
        name: &str,
        expected: AttributeValueType,
    ) -> ApiResult<Option<String>> {
        let def = self.resolve_definition(entity_kind, name)?;
        if def.value_type != expected {
            return Err(ApiError::ValidationError(format!(
                "属性{}声明类型为{}, 不能按{}读取",
                name, def.value_type, expected
            )));
        }

        let value = self
            .value_repo
            .find_by_entity_and_attr(entity_id, &def.attr_id)?;
        Ok(value.map(|v| v.raw_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_sqlite_connection;
    use std::sync::Mutex;

    fn setup_api() -> AttributeApi {
        let conn = open_sqlite_connection(":memory:").expect("Failed to open test db");
        let conn = Arc::new(Mutex::new(conn));
        let def_repo = Arc::new(
            AttributeDefinitionRepository::from_connection(conn.clone())
                .expect("Failed to create def repo"),
        );
        let value_repo = Arc::new(
            AttributeValueRepository::from_connection(conn.clone())
                .expect("Failed to create value repo"),
        );
        let config =
            Arc::new(ConfigManager::from_connection(conn).expect("Failed to create config"));
        AttributeApi::new(def_repo, value_repo, config)
    }

    #[test]
    fn test_set_then_overwrite() {
        let api = setup_api();
        api.register_definition(EntityKind::Course, "note", AttributeValueType::Text, None, None)
            .expect("Failed to register");

        api.set_attribute(EntityKind::Course, "C001", "note", "v1")
            .expect("Failed to set v1");
        api.set_attribute(EntityKind::Course, "C001", "note", "v2")
            .expect("Failed to set v2");

        let attrs = api.get_attributes("C001").expect("Failed to get");
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("note").map(String::as_str), Some("v2"));
    }

    #[test]
    fn test_get_attributes_empty_entity() {
        let api = setup_api();
        let attrs = api.get_attributes("nobody").expect("Failed to get");
        assert!(attrs.is_empty());
    }

    #[test]
    fn test_set_unregistered_is_not_found() {
        let api = setup_api();
        let result = api.set_attribute(EntityKind::Course, "C001", "ghost", "x");
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_cross_kind_name_is_integrity_error() {
        let api = setup_api();
        api.register_definition(
            EntityKind::Course,
            "late_penalty_pct",
            AttributeValueType::Decimal,
            None,
            None,
        )
        .expect("Failed to register");

        // 同名属性挂在 COURSE 下, 写到 ROOM 实体必须拒绝
        let result = api.set_attribute(EntityKind::Room, "R001", "late_penalty_pct", "5.0");
        assert!(matches!(result, Err(ApiError::BusinessRuleViolation(_))));
    }

    #[test]
    fn test_type_enforcement_on_write() {
        let api = setup_api();
        api.register_definition(EntityKind::Course, "max_retries", AttributeValueType::Int, None, None)
            .expect("Failed to register");

        assert!(matches!(
            api.set_attribute(EntityKind::Course, "C001", "max_retries", "abc"),
            Err(ApiError::ValidationError(_))
        ));
        api.set_attribute(EntityKind::Course, "C001", "max_retries", "3")
            .expect("Failed to set valid int");

        let value = api
            .get_int(EntityKind::Course, "C001", "max_retries")
            .expect("Failed to get");
        assert_eq!(value, Some(3));
    }

    #[test]
    fn test_bool_and_json_accessors() {
        let api = setup_api();
        api.register_definition(
            EntityKind::Offering,
            "plagiarism_check",
            AttributeValueType::Bool,
            None,
            None,
        )
        .expect("Failed to register");
        api.register_definition(
            EntityKind::Offering,
            "choice_options",
            AttributeValueType::Json,
            None,
            None,
        )
        .expect("Failed to register");

        api.set_attribute(EntityKind::Offering, "O001", "plagiarism_check", "TRUE")
            .expect("Failed to set bool");
        api.set_attribute(
            EntityKind::Offering,
            "O001",
            "choice_options",
            r#"["A","B","C"]"#,
        )
        .expect("Failed to set json");

        assert_eq!(
            api.get_bool(EntityKind::Offering, "O001", "plagiarism_check")
                .expect("Failed to get bool"),
            Some(true)
        );
        let options = api
            .get_json(EntityKind::Offering, "O001", "choice_options")
            .expect("Failed to get json")
            .expect("Missing json");
        assert_eq!(options.as_array().map(|a| a.len()), Some(3));

        // 声明为 BOOL 的属性不能按 INT 读取
        assert!(matches!(
            api.get_int(EntityKind::Offering, "O001", "plagiarism_check"),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_max_length_enforced() {
        let api = setup_api();
        api.register_definition(
            EntityKind::User,
            "nickname",
            AttributeValueType::Text,
            Some(4),
            None,
        )
        .expect("Failed to register");

        assert!(matches!(
            api.set_attribute(EntityKind::User, "U001", "nickname", "too-long"),
            Err(ApiError::ValidationError(_))
        ));
        api.set_attribute(EntityKind::User, "U001", "nickname", "abcd")
            .expect("Failed to set");
    }

    #[test]
    fn test_remove_attribute() {
        let api = setup_api();
        api.register_definition(EntityKind::Course, "note", AttributeValueType::Text, None, None)
            .expect("Failed to register");
        api.set_attribute(EntityKind::Course, "C001", "note", "v1")
            .expect("Failed to set");

        assert!(api
            .remove_attribute(EntityKind::Course, "C001", "note")
            .expect("Failed to remove"));
        assert!(!api
            .remove_attribute(EntityKind::Course, "C001", "note")
            .expect("Failed to remove"));
        assert!(api.get_attributes("C001").expect("Failed to get").is_empty());
    }
}

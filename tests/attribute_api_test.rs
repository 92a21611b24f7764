// ==========================================
// 扩展属性门面集成测试
// ==========================================
// 测试范围: 定义注册 → 类型校验写入 → 批量/类型化读取
// ==========================================


use academic_records::api::ApiError;
use academic_records::domain::types::{AttributeValueType, EntityKind};
use academic_records::logging;
use test_helpers::*;

#[test]
fn test_set_overwrite_get_roundtrip() {
    logging::init_test();
    let (state, _dir) = create_test_state();
    let course = seed_course(&state, "CS101");

    state
        .attribute_api
        .register_definition(
            EntityKind::Course,
            "late_penalty_pct",
            AttributeValueType::Decimal,
            None,
            Some("迟交扣分比例".to_string()),
        )
        .expect("Failed to register");

    // 两次写入同一属性, 读到的是后者
    state
        .attribute_api
        .set_attribute(EntityKind::Course, &course.course_id, "late_penalty_pct", "5.0")
        .expect("Failed to set first");
    state
        .attribute_api
        .set_attribute(EntityKind::Course, &course.course_id, "late_penalty_pct", "10.0")
        .expect("Failed to set second");

    let attrs = state
        .attribute_api
        .get_attributes(&course.course_id)
        .expect("Failed to get attributes");
    assert_eq!(attrs.len(), 1);
    assert_eq!(attrs.get("late_penalty_pct").map(String::as_str), Some("10.0"));

    // 类型化读取
    let pct = state
        .attribute_api
        .get_decimal(EntityKind::Course, &course.course_id, "late_penalty_pct")
        .expect("Failed to get decimal");
    assert_eq!(pct, Some(10.0));
}

#[test]
fn test_empty_entity_returns_empty_map() {
    let (state, _dir) = create_test_state();
    let course = seed_course(&state, "CS102");

    let attrs = state
        .attribute_api
        .get_attributes(&course.course_id)
        .expect("Failed to get attributes");
    assert!(attrs.is_empty());
}

#[test]
fn test_unregistered_attribute_rejected() {
    let (state, _dir) = create_test_state();
    let course = seed_course(&state, "CS103");

    let result = state.attribute_api.set_attribute(
        EntityKind::Course,
        &course.course_id,
        "never_registered",
        "x",
    );
    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

#[test]
fn test_cross_kind_collision_rejected() {
    let (state, _dir) = create_test_state();
    let room = seed_room(&state, "101");

    state
        .attribute_api
        .register_definition(
            EntityKind::Course,
            "plagiarism_check",
            AttributeValueType::Bool,
            None,
            None,
        )
        .expect("Failed to register");

    // 同名定义属于 COURSE, 写到 ROOM 实体是数据完整性错误
    let result = state.attribute_api.set_attribute(
        EntityKind::Room,
        &room.room_id,
        "plagiarism_check",
        "true",
    );
    assert!(matches!(result, Err(ApiError::BusinessRuleViolation(_))));
}

#[test]
fn test_declared_type_enforced_on_write() {
    let (state, _dir) = create_test_state();
    let course = seed_course(&state, "CS104");

    state
        .attribute_api
        .register_definition(
            EntityKind::Course,
            "retake_limit",
            AttributeValueType::Int,
            None,
            None,
        )
        .expect("Failed to register");

    // 非整数拒绝
    let result = state.attribute_api.set_attribute(
        EntityKind::Course,
        &course.course_id,
        "retake_limit",
        "twice",
    );
    assert!(matches!(result, Err(ApiError::ValidationError(_))));

    // 合法整数通过
    state
        .attribute_api
        .set_attribute(EntityKind::Course, &course.course_id, "retake_limit", "2")
        .expect("Failed to set int");
    assert_eq!(
        state
            .attribute_api
            .get_int(EntityKind::Course, &course.course_id, "retake_limit")
            .expect("Failed to get int"),
        Some(2)
    );
}

#[test]
fn test_json_attribute_roundtrip() {
    let (state, _dir) = create_test_state();
    let course = seed_course(&state, "CS105");

    state
        .attribute_api
        .register_definition(
            EntityKind::Course,
            "choice_options",
            AttributeValueType::Json,
            None,
            None,
        )
        .expect("Failed to register");

    // 非法 JSON 拒绝
    let result = state.attribute_api.set_attribute(
        EntityKind::Course,
        &course.course_id,
        "choice_options",
        "[A, B",
    );
    assert!(matches!(result, Err(ApiError::ValidationError(_))));

    state
        .attribute_api
        .set_attribute(
            EntityKind::Course,
            &course.course_id,
            "choice_options",
            r#"{"options": ["A", "B", "C"], "multi": false}"#,
        )
        .expect("Failed to set json");

    let value = state
        .attribute_api
        .get_json(EntityKind::Course, &course.course_id, "choice_options")
        .expect("Failed to get json")
        .expect("Missing json value");
    assert_eq!(value["options"].as_array().map(|a| a.len()), Some(3));
    assert_eq!(value["multi"].as_bool(), Some(false));
}

#[test]
fn test_definitions_listed_per_kind() {
    let (state, _dir) = create_test_state();

    state
        .attribute_api
        .register_definition(EntityKind::Room, "projector_model", AttributeValueType::Text, None, None)
        .expect("Failed to register");
    state
        .attribute_api
        .register_definition(EntityKind::Room, "has_recording", AttributeValueType::Bool, None, None)
        .expect("Failed to register");
    state
        .attribute_api
        .register_definition(EntityKind::Course, "retake_limit", AttributeValueType::Int, None, None)
        .expect("Failed to register");

    let room_defs = state
        .attribute_api
        .list_definitions(EntityKind::Room)
        .expect("Failed to list");
    assert_eq!(room_defs.len(), 2);

    let course_defs = state
        .attribute_api
        .list_definitions(EntityKind::Course)
        .expect("Failed to list");
    assert_eq!(course_defs.len(), 1);
}

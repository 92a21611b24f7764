// ==========================================
// 教务管理系统 - 课程与先修关系 API
// ==========================================
// 职责: 课程主数据维护、先修边增删、环检测
// 红线: 先修关系全图必须保持无环; 插入前做可达性检查
// ==========================================

use std::collections::HashSet;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::course::{Course, PrerequisiteEdge};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::course_repo::CourseRepository;
use crate::repository::prerequisite_repo::PrerequisiteRepository;

// ==========================================
// CourseApi - 课程与先修关系 API
// ==========================================

/// 课程与先修关系API
///
/// 职责：
/// 1. 课程创建与查询
/// 2. 先修边新增（自环/未知课程/重复边/成环四重校验）
/// 3. 先修边删除（无条件, 删除不会引入环）
/// 4. ActionLog记录
pub struct CourseApi {
    course_repo: Arc<CourseRepository>,
    edge_repo: Arc<PrerequisiteRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl CourseApi {
    /// 创建新的CourseApi实例
    pub fn new(
        course_repo: Arc<CourseRepository>,
        edge_repo: Arc<PrerequisiteRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            course_repo,
            edge_repo,
            action_log_repo,
        }
    }

    // ==========================================
    // 课程主数据
    // ==========================================

    /// 创建课程
    ///
    /// # 参数
    /// - code: 课程代码 (全局唯一)
    /// - title: 课程名称
    /// - credits: 学分
    pub fn create_course(&self, code: &str, title: &str, credits: f64) -> ApiResult<Course> {
        if code.trim().is_empty() {
            return Err(ApiError::InvalidInput("课程代码不能为空".to_string()));
        }
        if title.trim().is_empty() {
            return Err(ApiError::InvalidInput("课程名称不能为空".to_string()));
        }
        if credits < 0.0 {
            return Err(ApiError::InvalidInput("学分不能为负".to_string()));
        }

        let course = Course::new(code.trim().to_string(), title.trim().to_string(), credits);
        self.course_repo.insert(&course)?;

        tracing::info!("创建课程: {} ({})", course.code, course.course_id);
        Ok(course)
    }

    /// 按ID查询课程
    pub fn get_course(&self, course_id: &str) -> ApiResult<Course> {
        self.course_repo
            .find_by_id(course_id)?
            .ok_or_else(|| ApiError::NotFound(format!("课程(id={})不存在", course_id)))
    }

    /// 列出全部课程
    pub fn list_courses(&self) -> ApiResult<Vec<Course>> {
        Ok(self.course_repo.list_all()?)
    }

    // ==========================================
    // 先修关系
    // ==========================================

    /// 判断新增边 (course_id → candidate_prereq_id) 是否会成环
    ///
    /// 从候选先修课程出发, 沿既有先修边做深度优先遍历;
    /// 若遍历可达 course_id, 则新边会闭合为环。
    /// 共享祖先会使同一节点多次入栈, 必须用已访问集合保证终止。
    ///
    /// # 返回
    /// - Ok(true): 会成环, 不允许插入
    /// - Ok(false): 不会成环
    pub fn has_circular_dependency(
        &self,
        course_id: &str,
        candidate_prereq_id: &str,
    ) -> ApiResult<bool> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack: Vec<String> = vec![candidate_prereq_id.to_string()];

        while let Some(current) = stack.pop() {
            if current == course_id {
                return Ok(true);
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            for prereq_id in self.edge_repo.list_prereq_ids(&current)? {
                if !visited.contains(&prereq_id) {
                    stack.push(prereq_id);
                }
            }
        }

        Ok(false)
    }

    /// 新增先修关系
    ///
    /// 校验顺序: 自环 → 课程存在性 → 重复边 → 成环检测
    ///
    /// # 参数
    /// - course_id: 课程ID
    /// - prereq_course_id: 先修课程ID
    /// - operator: 操作人
    ///
    /// # 返回
    /// - Ok(()): 成功
    /// - Err(BusinessRuleViolation): 自环或重复边
    /// - Err(NotFound): 任一课程不存在
    /// - Err(PrerequisiteCycle): 新边会使依赖图成环
    pub fn add_prerequisite(
        &self,
        course_id: &str,
        prereq_course_id: &str,
        operator: &str,
    ) -> ApiResult<()> {
        if course_id.trim().is_empty() || prereq_course_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("课程ID不能为空".to_string()));
        }

        // 自环
        if course_id == prereq_course_id {
            return Err(ApiError::BusinessRuleViolation(
                "课程不能作为自身的先修课程".to_string(),
            ));
        }

        // 课程存在性
        if !self.course_repo.exists(course_id)? {
            return Err(ApiError::NotFound(format!("课程(id={})不存在", course_id)));
        }
        if !self.course_repo.exists(prereq_course_id)? {
            return Err(ApiError::NotFound(format!(
                "课程(id={})不存在",
                prereq_course_id
            )));
        }

        // 重复边
        if self.edge_repo.exists(course_id, prereq_course_id)? {
            return Err(ApiError::BusinessRuleViolation(format!(
                "先修关系已存在: {} → {}",
                course_id, prereq_course_id
            )));
        }

        // 成环检测
        if self.has_circular_dependency(course_id, prereq_course_id)? {
            return Err(ApiError::PrerequisiteCycle {
                course_id: course_id.to_string(),
                prereq_course_id: prereq_course_id.to_string(),
            });
        }

        let edge = PrerequisiteEdge::new(
            course_id.to_string(),
            prereq_course_id.to_string(),
            operator.to_string(),
        );
        self.edge_repo.insert(&edge)?;

        self.action_log_repo.insert(&ActionLog::new(
            ActionType::AddPrerequisite,
            operator.to_string(),
            Some(course_id.to_string()),
            Some(serde_json::json!({ "prereq_course_id": prereq_course_id })),
            None,
        ))?;

        tracing::info!("新增先修关系: {} → {}", course_id, prereq_course_id);
        Ok(())
    }

    /// 删除先修关系
    ///
    /// 无条件删除; 删除不会引入环, 不做重新校验
    ///
    /// # 返回
    /// - Ok(()): 成功
    /// - Err(NotFound): 边不存在
    pub fn remove_prerequisite(
        &self,
        course_id: &str,
        prereq_course_id: &str,
        operator: &str,
    ) -> ApiResult<()> {
        let affected = self.edge_repo.delete(course_id, prereq_course_id)?;
        if affected == 0 {
            return Err(ApiError::NotFound(format!(
                "先修关系不存在: {} → {}",
                course_id, prereq_course_id
            )));
        }

        self.action_log_repo.insert(&ActionLog::new(
            ActionType::RemovePrerequisite,
            operator.to_string(),
            Some(course_id.to_string()),
            Some(serde_json::json!({ "prereq_course_id": prereq_course_id })),
            None,
        ))?;

        tracing::info!("删除先修关系: {} → {}", course_id, prereq_course_id);
        Ok(())
    }

    /// 列出某课程的直接先修边
    pub fn list_prerequisites(&self, course_id: &str) -> ApiResult<Vec<PrerequisiteEdge>> {
        Ok(self.edge_repo.list_by_course(course_id)?)
    }

    /// 列出依赖某课程的全部边（反向查询）
    pub fn list_dependents(&self, prereq_course_id: &str) -> ApiResult<Vec<PrerequisiteEdge>> {
        Ok(self.edge_repo.list_by_prereq(prereq_course_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_sqlite_connection;
    use std::sync::Mutex;

    fn setup_api() -> CourseApi {
        let conn = open_sqlite_connection(":memory:").expect("Failed to open test db");
        let conn = Arc::new(Mutex::new(conn));
        let course_repo = Arc::new(
            CourseRepository::from_connection(conn.clone()).expect("Failed to create course repo"),
        );
        let edge_repo = Arc::new(
            PrerequisiteRepository::from_connection(conn.clone())
                .expect("Failed to create edge repo"),
        );
        let action_log_repo = Arc::new(
            ActionLogRepository::from_connection(conn).expect("Failed to create log repo"),
        );
        CourseApi::new(course_repo, edge_repo, action_log_repo)
    }

    fn create_courses(api: &CourseApi, n: usize) -> Vec<String> {
        (0..n)
            .map(|i| {
                api.create_course(&format!("CS{:03}", i + 101), &format!("课程{}", i + 1), 3.0)
                    .expect("Failed to create course")
                    .course_id
            })
            .collect()
    }

    #[test]
    fn test_self_prerequisite_rejected() {
        let api = setup_api();
        let ids = create_courses(&api, 1);

        let result = api.add_prerequisite(&ids[0], &ids[0], "admin");
        assert!(matches!(result, Err(ApiError::BusinessRuleViolation(_))));
    }

    #[test]
    fn test_unknown_course_rejected() {
        let api = setup_api();
        let ids = create_courses(&api, 1);

        assert!(matches!(
            api.add_prerequisite(&ids[0], "ghost", "admin"),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            api.add_prerequisite("ghost", &ids[0], "admin"),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_edge_rejected() {
        let api = setup_api();
        let ids = create_courses(&api, 2);

        api.add_prerequisite(&ids[0], &ids[1], "admin")
            .expect("Failed to add");
        let result = api.add_prerequisite(&ids[0], &ids[1], "admin");
        assert!(matches!(result, Err(ApiError::BusinessRuleViolation(_))));
    }

    #[test]
    fn test_two_node_cycle_rejected() {
        let api = setup_api();
        let ids = create_courses(&api, 2);

        api.add_prerequisite(&ids[0], &ids[1], "admin")
            .expect("Failed to add A→B");

        // A→B 入库后, B→A 必然成环
        assert!(api
            .has_circular_dependency(&ids[1], &ids[0])
            .expect("Failed to check"));
        let result = api.add_prerequisite(&ids[1], &ids[0], "admin");
        assert!(matches!(result, Err(ApiError::PrerequisiteCycle { .. })));
    }

    #[test]
    fn test_transitive_cycle_rejected() {
        let api = setup_api();
        let ids = create_courses(&api, 3);

        // C3 ← C2 ← C1 链; C1 → C3 会闭合三角环
        api.add_prerequisite(&ids[1], &ids[0], "admin")
            .expect("Failed to add");
        api.add_prerequisite(&ids[2], &ids[1], "admin")
            .expect("Failed to add");

        assert!(api
            .has_circular_dependency(&ids[0], &ids[2])
            .expect("Failed to check"));
        let result = api.add_prerequisite(&ids[0], &ids[2], "admin");
        assert!(matches!(result, Err(ApiError::PrerequisiteCycle { .. })));
    }

    #[test]
    fn test_shared_ancestor_terminates() {
        let api = setup_api();
        let ids = create_courses(&api, 4);

        // 菱形: C3→C1, C3→C2, C1→C0, C2→C0, 共享祖先 C0
        api.add_prerequisite(&ids[3], &ids[1], "admin").expect("add");
        api.add_prerequisite(&ids[3], &ids[2], "admin").expect("add");
        api.add_prerequisite(&ids[1], &ids[0], "admin").expect("add");
        api.add_prerequisite(&ids[2], &ids[0], "admin").expect("add");

        // 从 C3 出发经两条路径都会到达共享祖先 C0, 遍历必须终止并报环
        assert!(api
            .has_circular_dependency(&ids[0], &ids[3])
            .expect("Failed to check"));
        let result = api.add_prerequisite(&ids[0], &ids[3], "admin");
        assert!(matches!(result, Err(ApiError::PrerequisiteCycle { .. })));

        // 不成环方向仍可插入: C3 直接依赖 C0 只是补一条捷径边
        assert!(!api
            .has_circular_dependency(&ids[3], &ids[0])
            .expect("Failed to check"));
        api.add_prerequisite(&ids[3], &ids[0], "admin")
            .expect("Failed to add shortcut edge");
    }

    #[test]
    fn test_remove_then_reverse_succeeds() {
        let api = setup_api();
        let ids = create_courses(&api, 2);

        api.add_prerequisite(&ids[0], &ids[1], "admin")
            .expect("Failed to add");
        api.remove_prerequisite(&ids[0], &ids[1], "admin")
            .expect("Failed to remove");

        // 移除后反向边不再被挡
        api.add_prerequisite(&ids[1], &ids[0], "admin")
            .expect("Failed to add reverse");
    }

    #[test]
    fn test_remove_missing_edge_is_not_found() {
        let api = setup_api();
        let ids = create_courses(&api, 2);

        let result = api.remove_prerequisite(&ids[0], &ids[1], "admin");
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}

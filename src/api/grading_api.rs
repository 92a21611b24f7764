// ==========================================
// 教务管理系统 - 成绩构成 API
// ==========================================
// 职责: 开课主数据维护、成绩构成配置(整体替换)、总评计算、等级换算
// 红线: 已设权重之和不得超过 100
// 说明: 构成配置持久化到 grade_component 表, 进程内不持有缓存
// ==========================================

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::offering::{letter_grade, CourseOffering, GradeComponent};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::course_repo::CourseRepository;
use crate::repository::offering_repo::{GradeComponentRepository, OfferingRepository};

// ==========================================
// GradingApi - 成绩构成 API
// ==========================================

/// 成绩构成API
///
/// 职责：
/// 1. 开课创建与查询
/// 2. 成绩构成整体替换（权重校验）
/// 3. 加权总评计算与等级换算
/// 4. ActionLog记录
pub struct GradingApi {
    course_repo: Arc<CourseRepository>,
    offering_repo: Arc<OfferingRepository>,
    component_repo: Arc<GradeComponentRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl GradingApi {
    /// 创建新的GradingApi实例
    pub fn new(
        course_repo: Arc<CourseRepository>,
        offering_repo: Arc<OfferingRepository>,
        component_repo: Arc<GradeComponentRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            course_repo,
            offering_repo,
            component_repo,
            action_log_repo,
        }
    }

    // ==========================================
    // 开课主数据
    // ==========================================

    /// 创建开课
    ///
    /// # 参数
    /// - course_id: 课程ID
    /// - term: 学期 (如 2026-FALL)
    /// - instructor: 授课教师
    pub fn create_offering(
        &self,
        course_id: &str,
        term: &str,
        instructor: &str,
    ) -> ApiResult<CourseOffering> {
        if term.trim().is_empty() {
            return Err(ApiError::InvalidInput("学期不能为空".to_string()));
        }
        if instructor.trim().is_empty() {
            return Err(ApiError::InvalidInput("授课教师不能为空".to_string()));
        }
        if !self.course_repo.exists(course_id)? {
            return Err(ApiError::NotFound(format!("课程(id={})不存在", course_id)));
        }

        let offering = CourseOffering::new(
            course_id.to_string(),
            term.trim().to_string(),
            instructor.trim().to_string(),
        );
        self.offering_repo.insert(&offering)?;

        tracing::info!("创建开课: course={} term={}", course_id, term);
        Ok(offering)
    }

    /// 按ID查询开课
    pub fn get_offering(&self, offering_id: &str) -> ApiResult<CourseOffering> {
        self.offering_repo
            .find_by_id(offering_id)?
            .ok_or_else(|| ApiError::NotFound(format!("开课(id={})不存在", offering_id)))
    }

    // ==========================================
    // 成绩构成
    // ==========================================

    /// 替换开课的成绩构成
    ///
    /// 整体替换语义: 给定构成集合完整覆盖旧配置, 不做增量合并。
    /// 构成项不设结构性必选项, 全部由教师自行定义。
    ///
    /// # 参数
    /// - offering_id: 开课ID
    /// - components: (名称, 权重) 列表, 权重可空 (暂未定权)
    /// - operator: 操作人
    ///
    /// # 返回
    /// - Ok(()): 成功
    /// - Err(NotFound): 开课不存在
    /// - Err(InvalidInput): 名称为空/重名, 或单项权重超出 0-100
    /// - Err(WeightSumExceeded): 已设权重之和超过 100
    pub fn configure(
        &self,
        offering_id: &str,
        components: &[(String, Option<f64>)],
        operator: &str,
    ) -> ApiResult<()> {
        if !self.offering_repo.exists(offering_id)? {
            return Err(ApiError::NotFound(format!(
                "开课(id={})不存在",
                offering_id
            )));
        }

        // 名称校验
        let mut seen: HashSet<&str> = HashSet::new();
        for (name, weight) in components {
            let name = name.trim();
            if name.is_empty() {
                return Err(ApiError::InvalidInput("构成项名称不能为空".to_string()));
            }
            if !seen.insert(name) {
                return Err(ApiError::InvalidInput(format!("构成项重名: {}", name)));
            }
            if let Some(w) = weight {
                if !(0.0..=100.0).contains(w) {
                    return Err(ApiError::InvalidInput(format!(
                        "构成项{}权重超出范围: {}",
                        name, w
                    )));
                }
            }
        }

        // 权重和校验 (未设权重的项不计入)
        let sum: f64 = components.iter().filter_map(|(_, w)| *w).sum();
        if sum > 100.0 {
            return Err(ApiError::WeightSumExceeded { sum });
        }

        let rows: Vec<GradeComponent> = components
            .iter()
            .enumerate()
            .map(|(i, (name, weight))| GradeComponent {
                offering_id: offering_id.to_string(),
                name: name.trim().to_string(),
                weight: *weight,
                position: i as i32,
            })
            .collect();
        self.component_repo.replace_all(offering_id, &rows)?;

        self.action_log_repo.insert(&ActionLog::new(
            ActionType::ReplaceGradeScheme,
            operator.to_string(),
            Some(offering_id.to_string()),
            Some(serde_json::json!({
                "components": rows
                    .iter()
                    .map(|c| serde_json::json!({ "name": c.name, "weight": c.weight }))
                    .collect::<Vec<_>>(),
            })),
            None,
        ))?;

        tracing::info!(
            "替换成绩构成: offering={} components={} weight_sum={}",
            offering_id,
            rows.len(),
            sum
        );
        Ok(())
    }

    /// 查询开课的成绩构成（按配置顺序）
    pub fn get_config(&self, offering_id: &str) -> ApiResult<Vec<GradeComponent>> {
        if !self.offering_repo.exists(offering_id)? {
            return Err(ApiError::NotFound(format!(
                "开课(id={})不存在",
                offering_id
            )));
        }
        Ok(self.component_repo.list_by_offering(offering_id)?)
    }

    // ==========================================
    // 总评与等级
    // ==========================================

    /// 按已设权重计算加权总评
    ///
    /// 仅统计"已设权重"的构成项; 分数表中未配置的名称被忽略;
    /// 缺少某已设权构成项的分数按 0 计
    ///
    /// # 返回
    /// - Ok(f64): 加权总评 (0-100 量纲)
    /// - Err(NotFound): 开课不存在或尚未配置构成
    pub fn weighted_total(
        &self,
        offering_id: &str,
        scores: &HashMap<String, f64>,
    ) -> ApiResult<f64> {
        let components = self.get_config(offering_id)?;
        if components.is_empty() {
            return Err(ApiError::NotFound(format!(
                "开课(id={})尚未配置成绩构成",
                offering_id
            )));
        }

        let total = components
            .iter()
            .filter_map(|c| c.weight.map(|w| (c.name.as_str(), w)))
            .map(|(name, weight)| scores.get(name).copied().unwrap_or(0.0) * weight / 100.0)
            .sum();
        Ok(total)
    }

    /// 百分制总评换算为等级
    pub fn letter_grade(&self, total: f64) -> &'static str {
        letter_grade(total)
    }
}

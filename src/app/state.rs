// ==========================================
// 教务管理系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{AttributeApi, CourseApi, GradingApi, ReservationApi};
use crate::config::ConfigManager;
use crate::db::open_sqlite_connection;
use crate::repository::{
    ActionLogRepository, AttributeDefinitionRepository, AttributeValueRepository,
    CourseRepository, GradeComponentRepository, OfferingRepository, PrerequisiteRepository,
    ReservationRepository, RoomRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 扩展属性门面API
    pub attribute_api: Arc<AttributeApi>,

    /// 课程与先修关系API
    pub course_api: Arc<CourseApi>,

    /// 教室预约API
    pub reservation_api: Arc<ReservationApi>,

    /// 成绩构成API
    pub grading_api: Arc<GradingApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（用于审计追踪查询）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享数据库连接
    /// 2. 初始化所有Repository
    /// 3. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 创建数据库连接（共享连接, 统一 PRAGMA）
        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================

        // 属性目录与值表 (值表外键依赖目录表, 先建目录)
        let attribute_def_repo = Arc::new(
            AttributeDefinitionRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建AttributeDefinitionRepository: {}", e))?,
        );
        let attribute_value_repo = Arc::new(
            AttributeValueRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建AttributeValueRepository: {}", e))?,
        );

        // 课程与先修关系
        let course_repo = Arc::new(
            CourseRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建CourseRepository: {}", e))?,
        );
        let prerequisite_repo = Arc::new(
            PrerequisiteRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建PrerequisiteRepository: {}", e))?,
        );

        // 教室与预约
        let room_repo = Arc::new(
            RoomRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建RoomRepository: {}", e))?,
        );
        let reservation_repo = Arc::new(
            ReservationRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ReservationRepository: {}", e))?,
        );

        // 开课与成绩构成
        let offering_repo = Arc::new(
            OfferingRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建OfferingRepository: {}", e))?,
        );
        let component_repo = Arc::new(
            GradeComponentRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建GradeComponentRepository: {}", e))?,
        );

        // 操作日志
        let action_log_repo = Arc::new(
            ActionLogRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ActionLogRepository: {}", e))?,
        );

        // 配置管理器
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 创建API实例
        // ==========================================

        let attribute_api = Arc::new(AttributeApi::new(
            attribute_def_repo,
            attribute_value_repo,
            config_manager.clone(),
        ));

        let course_api = Arc::new(CourseApi::new(
            course_repo.clone(),
            prerequisite_repo,
            action_log_repo.clone(),
        ));

        let reservation_api = Arc::new(ReservationApi::new(
            room_repo,
            reservation_repo,
            action_log_repo.clone(),
            config_manager.clone(),
        ));

        let grading_api = Arc::new(GradingApi::new(
            course_repo,
            offering_repo,
            component_repo,
            action_log_repo.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            attribute_api,
            course_api,
            reservation_api,
            grading_api,
            config_manager,
            action_log_repo,
        })
    }
}

/// 获取默认数据库路径
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("ACADEMIC_RECORDS_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    // 先给一个默认回退值，后续如果能拿到 data_dir 再覆盖
    let mut path = PathBuf::from("./academic_records.db");

    // 尝试获取用户数据目录
    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("academic-records-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("academic-records");
        }

        if let Err(e) = std::fs::create_dir_all(&path) {
            tracing::warn!("无法创建数据目录 {:?}: {}, 回落当前目录", path, e);
            path = PathBuf::from(".");
        }
        path = path.join("academic_records.db");
    }

    path.to_string_lossy().to_string()
}

// ==========================================
// 教务管理系统 - 主入口
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 学籍与教学资源后端
// ==========================================

use academic_records::app::{get_default_db_path, AppState};
use academic_records::logging;

fn main() {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", academic_records::APP_NAME);
    tracing::info!("系统版本: {}", academic_records::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    // 创建AppState
    tracing::info!("正在初始化AppState...");
    let app_state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("无法初始化AppState: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("AppState初始化成功, 就绪");
    tracing::info!(
        "已注册课程属性定义: {}",
        app_state
            .attribute_api
            .list_definitions(academic_records::EntityKind::Course)
            .map(|defs| defs.len())
            .unwrap_or(0)
    );
}

use serde::Serialize;

use crate::realtime::ChildSnapshot;
use crate::routes::settings::model::Settings;

/// 家长端首屏数据：全部孩子的快照加当前配置
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub children: Vec<ChildSnapshot>,
    pub settings: Settings,
}

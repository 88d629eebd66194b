//! 共享库
//!
//! 包含嵌入规则引擎的宿主程序共用的配置加载与日志初始化代码。

pub mod config;
pub mod observability;

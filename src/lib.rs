//! # Certificate Wizard
//!
//! 把一张证书图片变成可批量填充的 SVG 模板，并按名单生成证书
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（字体库），只暴露能力
//! - `Rasterizer` - SVG → PNG
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不持有会话状态
//! - `LlmService` - 图片 → SVG 转换能力（`TemplateConverter`）
//! - `substitution` - 位置占位符替换 / 按 id 修改字段
//! - `batch_generator` - 按名单批量生成
//! - `ExportService` - 矢量 / 栅格 / 压缩包导出
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义向导的四个阶段
//! - `SessionState` - 唯一的会话状态和纯函数式的阶段转换
//! - `Wizard` - 串行化转换，忽略重置后过期的异步结果
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 按任务文件跑完整个向导并写出文件
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::Rasterizer;
pub use models::{
    ExportFormat, ExportedFile, FileFormat, GeneratedOutput, OutputId, Record, SourceImage,
    TemplateDocument,
};
pub use orchestrator::App;
pub use services::{ExportService, ExportStatus, LlmService, TemplateConverter};
pub use workflow::{SessionState, Stage, Wizard};

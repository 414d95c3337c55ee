//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责按任务文件驱动整个向导，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量证书处理器
//! - 管理应用生命周期（初始化、运行）
//! - 加载任务文件、证书图片和名单
//! - 创建并持有 Wizard、栅格化器
//! - 并发栅格化，写出导出文件
//! - 输出全局统计信息
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理一个任务文件)
//!     ↓
//! workflow::Wizard (阶段转换：上传 → 定制 → 批量 → 下载)
//!     ↓
//! services (能力层：llm / substitution / batch_generator / export)
//!     ↓
//! infrastructure (基础设施：Rasterizer)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层创建 Rasterizer 和 LLM 客户端
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **无业务逻辑**：只做调度和统计，不直接修改会话状态

pub mod batch_processor;

// 重新导出主要类型
pub use batch_processor::App;

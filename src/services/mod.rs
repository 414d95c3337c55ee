pub mod batch_generator;
pub mod export_service;
pub mod llm_service;
pub mod substitution;

pub use export_service::{ExportService, ExportStatus, RasterExport};
pub use llm_service::{LlmService, TemplateConverter};

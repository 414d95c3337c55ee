//! 证书向导 - 流程层
//!
//! 唯一持有 [`SessionState`] 的地方。所有阶段转换都经过这里：
//! 异步操作（转换、批量生成）期间不持有锁，完成时凭票据提交；
//! 重置会取消当前代的 [`CancellationToken`]，让未完成的任务直接放弃。

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult, WorkflowError};
use crate::models::image::SourceImage;
use crate::models::output::{ExportedFile, GeneratedOutput, OutputId};
use crate::models::record::Record;
use crate::services::batch_generator;
use crate::services::export_service::{ExportService, ExportStatus, RasterExport};
use crate::services::llm_service::TemplateConverter;
use crate::workflow::session::{SessionState, Stage, Ticket};

/// 证书向导
///
/// - 串行化所有阶段转换
/// - 把转换失败留在上传阶段，不向上层抛出未处理的故障
/// - 只在下载阶段开放导出
pub struct Wizard {
    state: Arc<Mutex<SessionState>>,
    cancel: Mutex<CancellationToken>,
    converter: Arc<dyn TemplateConverter>,
    exporter: ExportService,
}

impl Wizard {
    pub fn new(converter: Arc<dyn TemplateConverter>, exporter: ExportService) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::new())),
            cancel: Mutex::new(CancellationToken::new()),
            converter,
            exporter,
        }
    }

    // ========== 查询 ==========

    pub async fn stage(&self) -> Stage {
        self.state.lock().await.stage()
    }

    /// 当前会话的快照
    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    pub async fn outputs(&self) -> Vec<GeneratedOutput> {
        self.state.lock().await.outputs().to_vec()
    }

    pub async fn export_status(&self, id: OutputId) -> ExportStatus {
        self.exporter.status(id).await
    }

    /// 栅格化失败、已退回矢量导出的结果
    pub async fn failed_exports(&self) -> Vec<OutputId> {
        self.exporter.failed().await
    }

    // ========== 上传阶段 ==========

    pub async fn select_image(&self, image: SourceImage) -> AppResult<()> {
        info!("🖼️ 已选择图片: {} ({})", image.name(), image.mime_type());
        self.state.lock().await.select_image(image)?;
        Ok(())
    }

    /// 把已上传的图片转换成模板文档
    ///
    /// 每次调用最多发起一次转换请求；处理中再次调用返回 [`WorkflowError::Busy`]。
    /// 会话在转换期间被重置时返回 [`WorkflowError::Stale`]，新会话不受影响。
    /// 转换器 panic 或调用方丢弃这个 future 时，处理中标记同样会被清除。
    pub async fn convert(&self) -> AppResult<Stage> {
        let (pending, image, token) = {
            let mut state = self.state.lock().await;
            let (ticket, image) = state.begin_conversion()?;
            let pending = PendingTicket::new(&self.state, ticket);
            let token = self.cancel.lock().await.clone();
            (pending, image, token)
        };

        info!("🤖 开始转换图片: {}", image.name());
        let converter = self.converter.clone();
        let task = tokio::spawn(async move { converter.convert(&image).await });
        let abort = task.abort_handle();
        let joined = tokio::select! {
            _ = token.cancelled() => {
                abort.abort();
                debug!("会话已重置，放弃转换结果");
                return Err(WorkflowError::Stale.into());
            }
            joined = task => joined,
        };

        let mut state = self.state.lock().await;
        let ticket = pending.commit();
        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                error!("❌ 转换任务失败: {}", e);
                state.abort(ticket)?;
                return Err(WorkflowError::TaskFailed(e.to_string()).into());
            }
        };

        match state.complete_conversion(ticket, result) {
            Ok(()) => {
                info!("✅ 模板生成成功，进入定制阶段");
                Ok(state.stage())
            }
            Err(AppError::Workflow(WorkflowError::Stale)) => {
                debug!("会话已重置，放弃转换结果");
                Err(WorkflowError::Stale.into())
            }
            Err(e) => {
                error!("❌ 模板生成失败: {}", e);
                Err(e)
            }
        }
    }

    // ========== 定制阶段 ==========

    pub async fn update_field(&self, id: &str, value: &str) -> AppResult<()> {
        self.state.lock().await.update_field(id, value)
    }

    pub async fn replace_buffer(&self, text: impl Into<String>) -> AppResult<()> {
        self.state.lock().await.replace_buffer(text)?;
        Ok(())
    }

    pub async fn accept(&self) -> AppResult<()> {
        self.state.lock().await.accept()?;
        info!("✓ 模板已确认，进入批量阶段");
        Ok(())
    }

    pub async fn retry(&self) -> AppResult<()> {
        self.state.lock().await.retry()?;
        info!("↩️ 已放弃当前模板，返回上传阶段");
        Ok(())
    }

    // ========== 批量阶段 ==========

    /// 为每条记录生成一份证书，完成后进入下载阶段
    pub async fn generate(&self, records: Vec<Record>) -> AppResult<usize> {
        let (pending, template, token) = {
            let mut state = self.state.lock().await;
            let (ticket, template) = state.begin_batch(records.clone())?;
            let pending = PendingTicket::new(&self.state, ticket);
            let token = self.cancel.lock().await.clone();
            (pending, template, token)
        };

        info!("📝 开始批量生成，共 {} 条记录", records.len());
        let task = tokio::task::spawn_blocking(move || batch_generator::generate(&template, &records));
        let joined = tokio::select! {
            _ = token.cancelled() => {
                debug!("会话已重置，放弃生成结果");
                return Err(WorkflowError::Stale.into());
            }
            joined = task => joined,
        };

        let mut state = self.state.lock().await;
        let ticket = pending.commit();
        let outputs = match joined {
            Ok(outputs) => outputs,
            Err(e) => {
                error!("❌ 批量生成任务失败: {}", e);
                state.abort(ticket)?;
                return Err(WorkflowError::TaskFailed(e.to_string()).into());
            }
        };

        let count = outputs.len();
        state.complete_batch(ticket, outputs)?;
        info!("✅ 批量生成完成: {} 份证书", count);
        Ok(count)
    }

    // ========== 下载阶段 ==========

    pub async fn export_vector(&self, id: OutputId) -> AppResult<ExportedFile> {
        let output = find_output(&*self.state.lock().await, id)?;
        Ok(self.exporter.export_vector(&output))
    }

    /// 栅格导出；失败时退回矢量导出，状态单独记录
    ///
    /// 渲染期间会话被重置时，结果照常返回，但不会写入新会话的导出状态。
    pub async fn export_raster(&self, id: OutputId) -> AppResult<RasterExport> {
        let (output, token) = {
            let state = self.state.lock().await;
            let output = find_output(&state, id)?;
            (output, self.cancel.lock().await.clone())
        };
        Ok(self.exporter.export_raster(&output, &token).await)
    }

    /// 全部结果打包；失败时整体放弃，逐个导出仍然可用
    pub async fn export_archive(&self) -> AppResult<ExportedFile> {
        let outputs = {
            let state = self.state.lock().await;
            require_stage(&state, Stage::Download)?;
            state.outputs().to_vec()
        };
        self.exporter.export_archive(&outputs).await.map_err(|e| {
            warn!("⚠️ 打包失败，可改为逐个导出: {}", e);
            AppError::from(e)
        })
    }

    // ========== 重置 ==========

    /// 无条件回到初始状态，未完成的转换和生成都会被放弃
    pub async fn reset(&self) {
        {
            let mut state = self.state.lock().await;
            state.reset();
            let mut cancel = self.cancel.lock().await;
            cancel.cancel();
            *cancel = CancellationToken::new();
        }
        self.exporter.clear().await;
        info!("🔄 会话已重置");
    }
}

/// 尚未提交的票据
///
/// 转换或生成在提交前退出（panic、被取消、future 被丢弃）时，
/// 在析构中撤销处理中标记。会话已被重置时撤销不会生效。
struct PendingTicket {
    state: Arc<Mutex<SessionState>>,
    ticket: Ticket,
    armed: bool,
}

impl PendingTicket {
    fn new(state: &Arc<Mutex<SessionState>>, ticket: Ticket) -> Self {
        Self {
            state: state.clone(),
            ticket,
            armed: true,
        }
    }

    /// 交给完成路径处理，析构时不再撤销
    fn commit(mut self) -> Ticket {
        self.armed = false;
        self.ticket
    }
}

impl Drop for PendingTicket {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let ticket = self.ticket;
        match self.state.try_lock() {
            Ok(mut state) => abort_pending(&mut state, ticket),
            Err(_) => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let state = self.state.clone();
                    handle.spawn(async move { abort_pending(&mut *state.lock().await, ticket) });
                }
                Err(_) => warn!("⚠️ 无法撤销未完成的任务，请重置会话"),
            },
        }
    }
}

fn abort_pending(state: &mut SessionState, ticket: Ticket) {
    if state.abort(ticket).is_ok() {
        warn!("⚠️ 任务未完成即退出，已清除处理中标记");
    }
}

fn find_output(state: &SessionState, id: OutputId) -> AppResult<GeneratedOutput> {
    require_stage(state, Stage::Download)?;
    state
        .output(id)
        .cloned()
        .ok_or_else(|| WorkflowError::UnknownOutput(id.to_string()).into())
}

fn require_stage(state: &SessionState, expected: Stage) -> Result<(), WorkflowError> {
    if state.stage() != expected {
        return Err(WorkflowError::InvalidStage {
            expected,
            actual: state.stage(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversionError;
    use crate::infrastructure::Rasterizer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="80" height="40"><text id="name">{{0}}</text></svg>"#;

    /// 等待放行后才返回的转换器
    struct GatedConverter {
        gate: Notify,
    }

    #[async_trait]
    impl TemplateConverter for GatedConverter {
        async fn convert(&self, _image: &SourceImage) -> Result<String, ConversionError> {
            self.gate.notified().await;
            Ok(SVG.to_string())
        }
    }

    struct FixedConverter(Result<&'static str, ()>);

    #[async_trait]
    impl TemplateConverter for FixedConverter {
        async fn convert(&self, _image: &SourceImage) -> Result<String, ConversionError> {
            self.0
                .map(str::to_string)
                .map_err(|_| ConversionError::api_call_failed("fake", "unreachable"))
        }
    }

    /// 第一次调用 panic，之后正常返回
    struct PanicOnceConverter {
        panicked: AtomicBool,
    }

    #[async_trait]
    impl TemplateConverter for PanicOnceConverter {
        async fn convert(&self, _image: &SourceImage) -> Result<String, ConversionError> {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("converter crashed");
            }
            Ok(SVG.to_string())
        }
    }

    fn wizard(converter: Arc<dyn TemplateConverter>) -> Wizard {
        let exporter = ExportService::new(Arc::new(Rasterizer::without_system_fonts(800, 600)));
        Wizard::new(converter, exporter)
    }

    fn image() -> SourceImage {
        SourceImage::new("certificate.png", vec![1, 2, 3]).unwrap()
    }

    #[tokio::test]
    async fn test_reset_during_conversion_is_ignored() {
        let converter = Arc::new(GatedConverter { gate: Notify::new() });
        let wizard = Arc::new(wizard(converter.clone()));
        wizard.select_image(image()).await.unwrap();

        let task = tokio::spawn({
            let wizard = wizard.clone();
            async move { wizard.convert().await }
        });
        while !wizard.snapshot().await.is_processing() {
            tokio::task::yield_now().await;
        }

        wizard.reset().await;
        converter.gate.notify_one();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(AppError::Workflow(WorkflowError::Stale))));

        let state = wizard.snapshot().await;
        assert_eq!(state.stage(), Stage::Upload);
        assert!(state.template().is_none());
        assert!(state.source_image().is_none());
        assert!(!state.is_processing());
    }

    #[tokio::test]
    async fn test_converter_panic_clears_processing() {
        let wizard = wizard(Arc::new(PanicOnceConverter {
            panicked: AtomicBool::new(false),
        }));
        wizard.select_image(image()).await.unwrap();

        let err = wizard.convert().await.unwrap_err();
        assert!(matches!(err, AppError::Workflow(WorkflowError::TaskFailed(_))));
        let state = wizard.snapshot().await;
        assert_eq!(state.stage(), Stage::Upload);
        assert!(!state.is_processing());
        assert!(state.source_image().is_some());

        // 不需要重置就能再次转换
        assert_eq!(wizard.convert().await.unwrap(), Stage::Customize);
    }

    #[tokio::test]
    async fn test_timed_out_convert_clears_processing() {
        let wizard = wizard(Arc::new(GatedConverter { gate: Notify::new() }));
        wizard.select_image(image()).await.unwrap();

        let timed_out = tokio::time::timeout(Duration::from_millis(20), wizard.convert()).await;
        assert!(timed_out.is_err());

        let state = wizard.snapshot().await;
        assert_eq!(state.stage(), Stage::Upload);
        assert!(!state.is_processing());
        assert!(state.source_image().is_some());
        wizard.select_image(image()).await.unwrap();
    }

    #[tokio::test]
    async fn test_converter_failure_stays_at_upload() {
        let wizard = wizard(Arc::new(FixedConverter(Err(()))));
        wizard.select_image(image()).await.unwrap();

        let err = wizard.convert().await.unwrap_err();
        assert!(matches!(err, AppError::Conversion(ConversionError::ApiCallFailed { .. })));
        let state = wizard.snapshot().await;
        assert_eq!(state.stage(), Stage::Upload);
        assert!(!state.is_processing());
        assert!(state.source_image().is_some());
    }

    #[tokio::test]
    async fn test_full_flow_and_exports() {
        let wizard = wizard(Arc::new(FixedConverter(Ok(SVG))));
        wizard.select_image(image()).await.unwrap();
        assert_eq!(wizard.convert().await.unwrap(), Stage::Customize);
        wizard.accept().await.unwrap();

        let records = vec![
            Record::new(vec!["Ada Lovelace".into()]),
            Record::new(vec!["Alan Turing".into()]),
        ];
        assert_eq!(wizard.generate(records).await.unwrap(), 2);
        assert_eq!(wizard.stage().await, Stage::Download);

        let outputs = wizard.outputs().await;
        assert_eq!(outputs[0].name(), "certificate_Ada_Lovelace.svg");
        assert_eq!(outputs[1].name(), "certificate_Alan_Turing.svg");

        let vector = wizard.export_vector(outputs[0].id()).await.unwrap();
        assert_eq!(vector.bytes, outputs[0].content().as_bytes());

        let raster = wizard.export_raster(outputs[1].id()).await.unwrap();
        assert_eq!(raster.status, ExportStatus::Done);
        assert_eq!(wizard.export_status(outputs[1].id()).await, ExportStatus::Done);
        assert_eq!(wizard.export_status(outputs[0].id()).await, ExportStatus::Idle);

        let archive = wizard.export_archive().await.unwrap();
        assert_eq!(archive.name, "certificates.zip");

        wizard.reset().await;
        assert_eq!(wizard.stage().await, Stage::Upload);
        assert_eq!(wizard.export_status(outputs[1].id()).await, ExportStatus::Idle);
    }

    #[tokio::test]
    async fn test_reset_during_raster_export_leaves_no_status() {
        let wizard = Arc::new(wizard(Arc::new(FixedConverter(Ok(SVG)))));
        wizard.select_image(image()).await.unwrap();
        wizard.convert().await.unwrap();
        wizard.accept().await.unwrap();
        wizard
            .generate(vec![Record::new(vec!["Ada Lovelace".into()])])
            .await
            .unwrap();
        let id = wizard.outputs().await[0].id();

        let task = tokio::spawn({
            let wizard = wizard.clone();
            async move { wizard.export_raster(id).await }
        });
        wizard.reset().await;
        // 导出可能在重置前完成、被重置拒绝，或在渲染中途遇到重置
        let _ = task.await.unwrap();

        assert_eq!(wizard.export_status(id).await, ExportStatus::Idle);
        assert!(wizard.failed_exports().await.is_empty());
    }

    #[tokio::test]
    async fn test_exports_only_in_download_stage() {
        let wizard = wizard(Arc::new(FixedConverter(Ok(SVG))));
        let err = wizard.export_archive().await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Workflow(WorkflowError::InvalidStage {
                expected: Stage::Download,
                actual: Stage::Upload
            })
        ));
        assert!(wizard.export_vector(OutputId::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_output() {
        let wizard = wizard(Arc::new(FixedConverter(Ok(SVG))));
        wizard.select_image(image()).await.unwrap();
        wizard.convert().await.unwrap();
        wizard.accept().await.unwrap();
        wizard.generate(Vec::new()).await.unwrap();

        let err = wizard.export_vector(OutputId::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Workflow(WorkflowError::UnknownOutput(_))));
    }
}

//! 会话状态 - 流程层
//!
//! 向导唯一的可变状态，以及它的全部阶段转换。
//!
//! 转换都是同步的纯函数：异步操作拆成 `begin_*` / `complete_*` 两半，
//! 开始时拿到一张 [`Ticket`]，完成时凭票提交。会话被重置后旧票据失效，
//! 过期的结果不会改动新会话。

use std::fmt;

use crate::error::{AppError, ConversionError, WorkflowError};
use crate::models::image::SourceImage;
use crate::models::output::{GeneratedOutput, OutputId};
use crate::models::record::Record;
use crate::models::template::TemplateDocument;
use crate::services::substitution;

/// 向导阶段，严格线性推进
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Stage {
    /// 上传证书图片
    #[default]
    Upload = 0,
    /// 定制模板文字
    Customize = 1,
    /// 提供名单并批量生成
    Batch = 2,
    /// 下载生成结果
    Download = 3,
}

impl Stage {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Upload => "上传",
            Stage::Customize => "定制",
            Stage::Batch => "批量生成",
            Stage::Download => "下载",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.index())
    }
}

/// 异步操作的凭据，绑定发起时的会话代数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

impl Ticket {
    pub fn generation(self) -> u64 {
        self.generation
    }
}

/// 会话状态
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    stage: Stage,
    source_image: Option<SourceImage>,
    /// 最近一次提交的模板（转换成功或 accept 时写入）
    template: Option<TemplateDocument>,
    /// 定制阶段可编辑的文档文本
    editable: String,
    records: Vec<Record>,
    outputs: Vec<GeneratedOutput>,
    processing: bool,
    generation: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== 查询 ==========

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn source_image(&self) -> Option<&SourceImage> {
        self.source_image.as_ref()
    }

    pub fn template(&self) -> Option<&TemplateDocument> {
        self.template.as_ref()
    }

    pub fn editable(&self) -> &str {
        &self.editable
    }

    /// 可编辑文本中某个字段当前的值
    pub fn field(&self, id: &str) -> Option<String> {
        TemplateDocument::from_raw(self.editable.as_str()).field(id)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn outputs(&self) -> &[GeneratedOutput] {
        &self.outputs
    }

    pub fn output(&self, id: OutputId) -> Option<&GeneratedOutput> {
        self.outputs.iter().find(|output| output.id() == id)
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    // ========== 上传阶段 ==========

    /// 选择（或替换）证书图片
    pub fn select_image(&mut self, image: SourceImage) -> Result<(), WorkflowError> {
        self.require_idle(Stage::Upload)?;
        self.source_image = Some(image);
        Ok(())
    }

    /// 开始转换：置处理中标记，返回票据和待转换的图片
    pub fn begin_conversion(&mut self) -> Result<(Ticket, SourceImage), WorkflowError> {
        self.require_idle(Stage::Upload)?;
        let image = self.source_image.clone().ok_or(WorkflowError::MissingImage)?;
        self.processing = true;
        Ok((self.ticket(), image))
    }

    /// 提交转换结果
    ///
    /// 票据过期时返回 [`WorkflowError::Stale`]，状态不变。
    /// 否则总会清除处理中标记；成功时进入定制阶段，失败时停留在上传阶段，
    /// 不会留下半份文档。
    pub fn complete_conversion(
        &mut self,
        ticket: Ticket,
        result: Result<String, ConversionError>,
    ) -> Result<(), AppError> {
        self.check_ticket(ticket)?;
        self.processing = false;

        let document = result.and_then(|text| {
            TemplateDocument::parse(text).map_err(ConversionError::Malformed)
        })?;

        self.editable = document.as_str().to_string();
        self.template = Some(document);
        self.stage = Stage::Customize;
        Ok(())
    }

    // ========== 定制阶段 ==========

    /// 修改可编辑文本中的一个字段；字段不存在时文本不变
    pub fn update_field(&mut self, id: &str, value: &str) -> Result<(), AppError> {
        self.require_idle(Stage::Customize)?;
        self.editable = substitution::update_field(&self.editable, id, value)?;
        Ok(())
    }

    /// 直接替换整份可编辑文本
    pub fn replace_buffer(&mut self, text: impl Into<String>) -> Result<(), WorkflowError> {
        self.require_idle(Stage::Customize)?;
        self.editable = text.into();
        Ok(())
    }

    /// 接受当前文本作为最终模板，进入批量阶段
    pub fn accept(&mut self) -> Result<(), WorkflowError> {
        self.require_idle(Stage::Customize)?;
        self.template = Some(TemplateDocument::from_raw(self.editable.as_str()));
        self.stage = Stage::Batch;
        Ok(())
    }

    /// 放弃当前文档回到上传阶段，保留已上传的图片
    pub fn retry(&mut self) -> Result<(), WorkflowError> {
        self.require_idle(Stage::Customize)?;
        self.template = None;
        self.editable.clear();
        self.stage = Stage::Upload;
        Ok(())
    }

    // ========== 批量阶段 ==========

    /// 开始批量生成：记录名单，返回票据和最终模板
    pub fn begin_batch(
        &mut self,
        records: Vec<Record>,
    ) -> Result<(Ticket, TemplateDocument), WorkflowError> {
        self.require_idle(Stage::Batch)?;
        let template = self.template.clone().ok_or(WorkflowError::MissingTemplate)?;
        self.records = records;
        self.processing = true;
        Ok((self.ticket(), template))
    }

    /// 提交生成结果，进入下载阶段
    pub fn complete_batch(
        &mut self,
        ticket: Ticket,
        outputs: Vec<GeneratedOutput>,
    ) -> Result<(), WorkflowError> {
        self.check_ticket(ticket)?;
        self.processing = false;
        self.outputs = outputs;
        self.stage = Stage::Download;
        Ok(())
    }

    /// 放弃进行中的异步操作，清除处理中标记，阶段不变
    pub fn abort(&mut self, ticket: Ticket) -> Result<(), WorkflowError> {
        self.check_ticket(ticket)?;
        self.processing = false;
        Ok(())
    }

    // ========== 重置 ==========

    /// 无条件清空会话，使所有未完成的票据失效
    pub fn reset(&mut self) {
        let generation = self.generation + 1;
        *self = Self {
            generation,
            ..Self::default()
        };
    }

    // ========== 内部检查 ==========

    fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation,
        }
    }

    fn check_ticket(&self, ticket: Ticket) -> Result<(), WorkflowError> {
        if ticket.generation != self.generation || !self.processing {
            return Err(WorkflowError::Stale);
        }
        Ok(())
    }

    fn require_idle(&self, expected: Stage) -> Result<(), WorkflowError> {
        if self.processing {
            return Err(WorkflowError::Busy);
        }
        if self.stage != expected {
            return Err(WorkflowError::InvalidStage {
                expected,
                actual: self.stage,
            });
        }
        Ok(())
    }
}

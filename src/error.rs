use thiserror::Error;

use crate::workflow::session::Stage;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 流程状态错误
    #[error("流程错误: {0}")]
    Workflow(#[from] WorkflowError),
    /// 图片转换错误
    #[error("转换错误: {0}")]
    Conversion(#[from] ConversionError),
    /// 文档解析错误
    #[error("文档错误: {0}")]
    Document(#[from] DocumentError),
    /// 导出错误
    #[error("导出错误: {0}")]
    Export(#[from] ExportError),
    /// 名单数据错误
    #[error("名单错误: {0}")]
    Record(#[from] RecordError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误 ({path}): {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 流程状态错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    /// 当前阶段不允许该操作
    #[error("当前阶段 {actual} 不允许该操作 (需要: {expected})")]
    InvalidStage { expected: Stage, actual: Stage },
    /// 已有任务在处理中
    #[error("已有任务正在处理中，请稍后再试")]
    Busy,
    /// 尚未上传图片
    #[error("尚未上传证书图片")]
    MissingImage,
    /// 尚未生成模板
    #[error("尚未生成模板文档")]
    MissingTemplate,
    /// 回调属于已被重置的会话
    #[error("会话已被重置，忽略过期的结果")]
    Stale,
    /// 后台任务异常退出
    #[error("后台任务执行失败: {0}")]
    TaskFailed(String),
    /// 找不到指定的输出
    #[error("找不到输出: {0}")]
    UnknownOutput(String),
}

/// 图片转换错误
#[derive(Debug, Error)]
pub enum ConversionError {
    /// 调用 AI 服务失败
    #[error("AI 服务调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },
    /// 返回内容为空
    #[error("AI 服务返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 返回内容不是 SVG 文档
    #[error("AI 服务返回的内容不是 SVG 文档")]
    NotSvg,
    /// 返回的文档无法解析
    #[error("AI 服务返回的文档无法解析: {0}")]
    Malformed(#[from] DocumentError),
    /// 请求构建失败
    #[error("请求构建失败: {0}")]
    Request(String),
}

/// 文档解析错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// XML 解析失败
    #[error("XML 解析失败 (位置 {position}): {message}")]
    Parse { position: u64, message: String },
    /// 文档没有根元素
    #[error("文档中没有根元素")]
    MissingRoot,
    /// 未闭合的元素
    #[error("元素 <{0}> 未闭合")]
    Unclosed(String),
}

/// 导出错误
#[derive(Debug, Error)]
pub enum ExportError {
    /// 栅格化失败
    #[error("栅格化失败: {0}")]
    Raster(#[from] RasterError),
    /// 压缩包构建失败
    #[error("压缩包构建失败: {0}")]
    Archive(String),
    /// 后台任务执行失败
    #[error("后台任务执行失败: {0}")]
    Task(String),
}

/// 栅格化错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RasterError {
    /// 文档无法解析
    #[error("SVG 解析失败: {0}")]
    Parse(String),
    /// 画布尺寸无效
    #[error("无效的画布尺寸 {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    /// PNG 编码失败
    #[error("PNG 编码失败: {0}")]
    Encode(String),
}

/// 名单数据错误
#[derive(Debug, Error)]
pub enum RecordError {
    /// 读取名单文件失败
    #[error("读取名单文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 不支持的导出格式
    #[error("不支持的导出格式: {0}")]
    UnknownFormat(String),
    /// 不支持的图片类型
    #[error("请上传图片文件 (不支持的类型: {0})")]
    UnsupportedImage(String),
    /// 图片过大
    #[error("图片过大: {size} 字节 (上限 {limit} 字节)")]
    ImageTooLarge { size: usize, limit: usize },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读写错误
    pub fn file(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File {
            path: path.into(),
            source,
        }
    }
}

impl ConversionError {
    /// 创建 AI 服务调用错误
    pub fn api_call_failed(model: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ConversionError::ApiCallFailed {
            model: model.into(),
            message: err.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

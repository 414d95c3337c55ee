//! LLM 服务 - 业务能力层
//!
//! 只负责"图片 → SVG 模板"的转换能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Gemini, Azure, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ConversionError;
use crate::models::image::SourceImage;

/// 随图片一起发送的用户消息
pub const CONVERT_MESSAGE: &str = "Convert this image";

/// 图片 → 文档转换能力
///
/// 外部协作方的边界：给定图片，返回 SVG 文本或失败
#[async_trait]
pub trait TemplateConverter: Send + Sync {
    async fn convert(&self, image: &SourceImage) -> Result<String, ConversionError>;
}

/// LLM 服务
///
/// 职责：
/// - 调用 Vision API 把证书图片转换成 SVG
/// - 清理返回内容中的 markdown 包裹
/// - 不持有会话状态
/// - 不关心流程顺序
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    system_instruction: String,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            system_instruction: config.system_instruction(),
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    /// - `imgs`: 图片 URL 列表（可以是 data URL），会追加到用户消息中
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（字符串）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
        imgs: &[String],
    ) -> Result<String, ConversionError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("包含 {} 张图片", imgs.len());

        let request_err = |e: async_openai::error::OpenAIError| ConversionError::Request(e.to_string());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(request_err)?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        // 文本 + 图片
        let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
            ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: user_message.to_string(),
                },
            ),
        ];
        for url in imgs {
            content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: url.clone(),
                        detail: Some(ImageDetail::High),
                    },
                },
            ));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()
            .map_err(request_err)?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.2)
            .max_tokens(16384u32)
            .build()
            .map_err(request_err)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            ConversionError::api_call_failed(&self.model_name, e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ConversionError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl TemplateConverter for LlmService {
    async fn convert(&self, image: &SourceImage) -> Result<String, ConversionError> {
        debug!(
            "开始转换图片 {} ({}, {} 字节)",
            image.name(),
            image.mime_type(),
            image.bytes().len()
        );
        let response = self
            .send_to_llm(
                CONVERT_MESSAGE,
                Some(&self.system_instruction),
                &[image.to_data_url()],
            )
            .await?;
        extract_svg(&response)
    }
}

/// 从 LLM 响应中取出 `<svg …>…</svg>` 部分（去掉 markdown 代码块和说明文字）
pub fn extract_svg(response: &str) -> Result<String, ConversionError> {
    let start = response.find("<svg").ok_or(ConversionError::NotSvg)?;
    let end = response
        .rfind("</svg>")
        .map(|idx| idx + "</svg>".len())
        .filter(|end| *end > start)
        .ok_or(ConversionError::NotSvg)?;

    // 保留紧挨着的 XML 声明
    let prefix = &response[..start];
    let start = match prefix.rfind("<?xml") {
        Some(decl) if prefix[decl..].trim_end().ends_with("?>") => decl,
        _ => start,
    };

    Ok(response[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 创建测试用的 LlmService
    fn create_test_service() -> LlmService {
        let config = Config {
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or_default(),
            ..Config::default()
        };
        LlmService::new(&config)
    }

    #[test]
    fn test_extract_svg_plain() {
        let svg = r#"<svg width="10" height="10"></svg>"#;
        assert_eq!(extract_svg(svg).unwrap(), svg);
    }

    #[test]
    fn test_extract_svg_from_markdown() {
        let response = "Here is your certificate:\n```svg\n<svg width=\"10\"><text id=\"name\">A</text></svg>\n```\nEnjoy!";
        assert_eq!(
            extract_svg(response).unwrap(),
            "<svg width=\"10\"><text id=\"name\">A</text></svg>"
        );
    }

    #[test]
    fn test_extract_svg_keeps_declaration() {
        let response = "```xml\n<?xml version=\"1.0\"?>\n<svg></svg>\n```";
        assert_eq!(
            extract_svg(response).unwrap(),
            "<?xml version=\"1.0\"?>\n<svg></svg>"
        );
    }

    #[test]
    fn test_extract_svg_drops_detached_declaration() {
        let response = "<?xml version=\"1.0\"?>\nHere is your file:\n<svg></svg>";
        assert_eq!(extract_svg(response).unwrap(), "<svg></svg>");

        let unterminated = "<?xml version=\"1.0\"\n<svg></svg>";
        assert_eq!(extract_svg(unterminated).unwrap(), "<svg></svg>");
    }

    #[test]
    fn test_extract_svg_rejects_other_content() {
        assert!(matches!(
            extract_svg("I cannot convert this image."),
            Err(ConversionError::NotSvg)
        ));
        assert!(matches!(extract_svg("<svg width=\"1\">"), Err(ConversionError::NotSvg)));
    }

    /// 测试真实的图片转换
    ///
    /// 运行方式：
    /// ```bash
    /// LLM_API_KEY=... CERT_IMAGE=template.png cargo test test_convert_live -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_convert_live() {
        let _ = tracing_subscriber::fmt::try_init();

        let service = create_test_service();
        let path = std::env::var("CERT_IMAGE").unwrap_or_else(|_| "template.png".to_string());
        let bytes = std::fs::read(&path).expect("读取测试图片失败");
        let image = SourceImage::new(path, bytes).unwrap();

        let svg = service.convert(&image).await.expect("转换失败");
        println!("\n========== LLM 响应 ==========");
        println!("{}", svg);
        println!("==============================\n");
        assert!(svg.starts_with("<svg") || svg.starts_with("<?xml"));
    }
}

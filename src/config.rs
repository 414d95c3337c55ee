use crate::error::ConfigError;

/// 默认的转换指令（未找到提示词文件时使用）
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You convert photos and scans of certificates into a single, \
self-contained SVG document. Reproduce the layout, colors, borders and decorations. Every text element \
that a recipient would change must be a <text> element: give the recipient name id=\"name\", the \
achievement or course message id=\"message\" and the date id=\"date\". Declare explicit width and \
height attributes on the root <svg>. Reply with the SVG code only, without explanations or markdown.";

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 运行日志文件
    pub output_log_file: String,
    /// 导出文件存放目录
    pub output_dir: String,
    /// 默认的任务描述文件
    pub job_file: String,
    /// 名单字段分隔符
    pub record_delimiter: char,
    /// 文档未声明尺寸时的栅格化宽度
    pub raster_fallback_width: u32,
    /// 文档未声明尺寸时的栅格化高度
    pub raster_fallback_height: u32,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 转换指令所在的提示词文件
    pub prompt_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            output_dir: "certificates".to_string(),
            job_file: "job.toml".to_string(),
            record_delimiter: ',',
            raster_fallback_width: 800,
            raster_fallback_height: 600,
            llm_api_key: String::new(),
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            llm_model_name: "gemini-2.5-pro".to_string(),
            prompt_file: "PROMPT.txt".to_string(),
        }
    }
}

impl Config {
    /// 从环境变量加载配置，未设置的项使用默认值
    ///
    /// 数值类变量格式错误时直接报错，避免静默回退到默认值
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();
        Ok(Self {
            verbose_logging: parse_env("VERBOSE_LOGGING", "bool")?.unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or(default.output_dir),
            job_file: std::env::var("JOB_FILE").unwrap_or(default.job_file),
            record_delimiter: parse_env("RECORD_DELIMITER", "char")?.unwrap_or(default.record_delimiter),
            raster_fallback_width: parse_env("RASTER_FALLBACK_WIDTH", "u32")?
                .unwrap_or(default.raster_fallback_width),
            raster_fallback_height: parse_env("RASTER_FALLBACK_HEIGHT", "u32")?
                .unwrap_or(default.raster_fallback_height),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            prompt_file: std::env::var("PROMPT_FILE").unwrap_or(default.prompt_file),
        })
    }

    /// 读取转换指令：优先使用提示词文件，读取失败时使用内置指令
    pub fn system_instruction(&self) -> String {
        match std::fs::read_to_string(&self.prompt_file) {
            Ok(text) if !text.trim().is_empty() => text,
            _ => {
                tracing::debug!("未找到提示词文件 {}，使用内置指令", self.prompt_file);
                DEFAULT_SYSTEM_INSTRUCTION.to_string()
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(
    var_name: &str,
    expected_type: &str,
) -> Result<Option<T>, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.record_delimiter, ',');
        assert_eq!(config.raster_fallback_width, 800);
        assert_eq!(config.raster_fallback_height, 600);
    }

    #[test]
    fn test_parse_env_reports_bad_value() {
        std::env::set_var("CERT_WIZARD_TEST_BAD_U32", "abc");
        let result: Result<Option<u32>, _> = parse_env("CERT_WIZARD_TEST_BAD_U32", "u32");
        assert!(matches!(result, Err(ConfigError::EnvVarParseFailed { .. })));

        let missing: Option<u32> = parse_env("CERT_WIZARD_TEST_MISSING", "u32").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_system_instruction_falls_back_to_default() {
        let config = Config {
            prompt_file: "does/not/exist/PROMPT.txt".to_string(),
            ..Config::default()
        };
        assert_eq!(config.system_instruction(), DEFAULT_SYSTEM_INSTRUCTION);
    }
}

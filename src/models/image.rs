//! 上传的证书图片

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use phf::phf_map;

use crate::error::ConfigError;

/// 图片大小上限（10MB）
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// 扩展名 → MIME 类型
static IMAGE_MIME_TYPES: phf::Map<&'static str, &'static str> = phf_map! {
    "png" => "image/png",
    "jpg" => "image/jpeg",
    "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "bmp" => "image/bmp",
};

/// 源图片（只在上传阶段使用，转换完成后保留以便重试）
#[derive(Clone, PartialEq, Eq)]
pub struct SourceImage {
    name: String,
    mime_type: &'static str,
    bytes: Vec<u8>,
}

impl SourceImage {
    /// 根据文件名判断类型并校验大小
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ConfigError> {
        let name = name.into();
        let mime_type = mime_for(&name).ok_or_else(|| ConfigError::UnsupportedImage(name.clone()))?;
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ConfigError::ImageTooLarge {
                size: bytes.len(),
                limit: MAX_IMAGE_BYTES,
            });
        }
        Ok(Self {
            name,
            mime_type,
            bytes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// 编码成 data URL，供 Vision API 使用
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

impl std::fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceImage")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// 按扩展名查找 MIME 类型（忽略 URL 查询串）
pub fn mime_for(name: &str) -> Option<&'static str> {
    let path = name.split(['?', '#']).next().unwrap_or(name);
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    IMAGE_MIME_TYPES.get(ext.as_str()).copied()
}

//! 栅格化器 - 基础设施层
//!
//! 持有唯一的字体库（加载系统字体代价较高），只暴露"SVG → PNG"的能力

use resvg::{tiny_skia, usvg};
use tracing::debug;

use crate::error::RasterError;
use crate::models::svg::SvgDocument;

/// 单次渲染允许的最大像素数（约 200MB 的 RGBA 缓冲）
pub const MAX_RASTER_PIXELS: u64 = 50_000_000;

/// 栅格化器
///
/// 职责：
/// - 持有字体库和解析选项
/// - 按文档声明的尺寸渲染
/// - 不认识生成结果 / 导出状态
pub struct Rasterizer {
    options: usvg::Options<'static>,
    fallback_size: (u32, u32),
}

impl Rasterizer {
    /// 创建栅格化器并加载系统字体
    pub fn new(fallback_width: u32, fallback_height: u32) -> Self {
        let mut rasterizer = Self::without_system_fonts(fallback_width, fallback_height);
        rasterizer.options.fontdb_mut().load_system_fonts();
        debug!("已加载 {} 个字体", rasterizer.options.fontdb.len());
        rasterizer
    }

    /// 不加载系统字体（文字不会被渲染，主要用于测试）
    pub fn without_system_fonts(fallback_width: u32, fallback_height: u32) -> Self {
        let mut options = usvg::Options::default();
        if let Some(size) = usvg::Size::from_wh(fallback_width as f32, fallback_height as f32) {
            options.default_size = size;
        }
        Self {
            options,
            fallback_size: (fallback_width, fallback_height),
        }
    }

    /// 文档声明的画布尺寸：width/height 属性，其次 viewBox，最后使用默认尺寸
    pub fn intrinsic_size(&self, svg: &str) -> Result<(u32, u32), RasterError> {
        let doc = SvgDocument::parse(svg).map_err(|e| RasterError::Parse(e.to_string()))?;
        let Some(root) = doc.root() else {
            return Ok(self.fallback_size);
        };

        let declared = match (
            root.attr("width").and_then(parse_length),
            root.attr("height").and_then(parse_length),
        ) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => root.attr("viewBox").and_then(parse_view_box),
        };

        Ok(declared
            .map(|(w, h)| (w.max(0.0).ceil() as u32, h.max(0.0).ceil() as u32))
            .unwrap_or(self.fallback_size))
    }

    /// 渲染成 PNG 字节
    pub fn render_png(&self, svg: &str) -> Result<Vec<u8>, RasterError> {
        let (width, height) = self.intrinsic_size(svg)?;
        if width == 0 || height == 0 || u64::from(width) * u64::from(height) > MAX_RASTER_PIXELS {
            return Err(RasterError::InvalidSize { width, height });
        }

        let tree = usvg::Tree::from_str(svg, &self.options)
            .map_err(|e| RasterError::Parse(e.to_string()))?;

        let mut pixmap =
            tiny_skia::Pixmap::new(width, height).ok_or(RasterError::InvalidSize { width, height })?;

        let size = tree.size();
        let transform = tiny_skia::Transform::from_scale(
            width as f32 / size.width(),
            height as f32 / size.height(),
        );
        resvg::render(&tree, transform, &mut pixmap.as_mut());

        let png = pixmap
            .encode_png()
            .map_err(|e| RasterError::Encode(e.to_string()))?;
        debug!("栅格化完成: {}x{}, {} 字节", width, height, png.len());
        Ok(png)
    }
}

/// 解析长度属性，只接受纯数字或 px
fn parse_length(value: &str) -> Option<f32> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value).trim();
    number.parse::<f32>().ok().filter(|n| n.is_finite())
}

fn parse_view_box(value: &str) -> Option<(f32, f32)> {
    let parts: Vec<f32> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f32>().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [_, _, w, h] => Some((*w, *h)),
        _ => None,
    }
}

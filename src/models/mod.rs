pub mod image;
pub mod loaders;
pub mod output;
pub mod record;
pub mod svg;
pub mod template;

pub use image::SourceImage;
pub use loaders::{load_job, load_records, load_source_image, CertificateJob};
pub use output::{ExportFormat, ExportedFile, FileFormat, GeneratedOutput, OutputId};
pub use record::Record;
pub use svg::{SvgDocument, SvgElement, SvgNode};
pub use template::TemplateDocument;

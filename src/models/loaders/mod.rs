pub mod job_loader;

pub use job_loader::{load_job, load_records, load_source_image, CertificateJob};

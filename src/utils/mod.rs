pub mod logging;

pub use logging::{
    init_log_file, log_records_loaded, log_startup, print_final_stats, truncate_text, RunStats,
};

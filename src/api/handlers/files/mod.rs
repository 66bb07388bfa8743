pub mod list;
pub mod manage;
pub mod stats;
pub mod types;
pub mod upload;

// Re-export all types
pub use types::*;

// Re-export all handlers
pub use list::{get_file, list_files};
pub use manage::{delete_file, restore_file, update_file};
pub use stats::file_stats;
pub use upload::{upload_file, upload_multiple};

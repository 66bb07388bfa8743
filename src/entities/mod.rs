pub mod prelude;

pub mod file_tags;
pub mod uploaded_files;

pub use super::file_tags::Entity as FileTags;
pub use super::uploaded_files::Entity as UploadedFiles;

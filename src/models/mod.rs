pub mod category;
pub mod file_record;
pub mod principal;

pub use category::{Category, CategoryPolicy, UnknownCategory};
pub use file_record::{FileDraft, FileRecord};
pub use principal::{Principal, Role};

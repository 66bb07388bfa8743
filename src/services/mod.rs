pub mod file_service;
pub mod ingestion;
pub mod storage;

pub mod encode_job;
pub mod repository;
pub mod storage;

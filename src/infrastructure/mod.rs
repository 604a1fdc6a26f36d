pub mod cdn;
pub mod db;
pub mod queue;
pub mod storage;

pub mod local;
pub mod managed;

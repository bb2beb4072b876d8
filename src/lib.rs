pub mod config;
pub mod evaluation;
pub mod neat;
pub mod policy;
pub mod snake;
pub mod storage;
pub mod training;

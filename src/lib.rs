pub mod config;
pub mod domain;
pub mod fetch;
pub mod list;
pub mod repository;
pub mod storage;
pub mod use_cases;
pub mod util;

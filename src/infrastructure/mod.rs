pub mod database;
pub mod fetcher;
pub mod storage;

pub mod error;
pub mod fetcher;
pub mod pipeline;
pub mod sink;
pub mod storage;
pub mod table;

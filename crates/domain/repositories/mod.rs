pub mod analyzer;
pub mod fetcher;
pub mod storage;
pub mod video_catalog;

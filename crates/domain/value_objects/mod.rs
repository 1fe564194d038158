pub mod analysis;
pub mod artifacts;
pub mod storage;
pub mod streams;
pub mod video_url;

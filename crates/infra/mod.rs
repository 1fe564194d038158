pub mod fetchers;
pub mod inference;
pub mod storages;
pub mod video_sources;

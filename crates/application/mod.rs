pub mod prompts;
pub mod result_normalizer;
pub mod stream_selector;
pub mod uploader;
pub mod usecases;

pub mod object_storage;
pub mod s3;

mod image_store;
mod s3_store;

pub use image_store::{image_key, ImageStore, ImageUpload};
pub use s3_store::{create_s3_client, S3Credentials, S3ImageStore};

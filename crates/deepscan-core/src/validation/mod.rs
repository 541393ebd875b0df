//! Validation modules

pub mod media;

pub use media::{
    content_type_for_extension, validator_for_category, AcceptPolicy, MediaValidator,
    UploadPolicy, ValidationError, IMAGE_CONTENT_TYPES, IMAGE_EXTENSIONS, MAX_UPLOAD_SIZE_BYTES,
    VIDEO_CONTENT_TYPES, VIDEO_EXTENSIONS,
};

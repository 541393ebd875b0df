use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;

use crate::models::{MediaCandidate, MediaCategory, MediaFile};

/// Largest file accepted for analysis (100 MiB).
pub const MAX_UPLOAD_SIZE_BYTES: u64 = 100 * 1024 * 1024;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];
pub const IMAGE_CONTENT_TYPES: &[&str] = &["image/png", "image/jpeg", "image/jpg"];

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi"];
pub const VIDEO_CONTENT_TYPES: &[&str] = &[
    "video/mp4",
    "video/quicktime",
    "video/x-msvideo",
    "video/avi",
    "video/msvideo",
];

/// Validation errors for staged media files
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Unsupported file type: {content_type} (accepted: {accepted:?})")]
    UnsupportedType {
        content_type: String,
        accepted: Vec<String>,
    },

    #[error("Invalid file extension: {extension} (allowed: {allowed:?})")]
    InvalidExtension {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Empty file")]
    EmptyFile,
}

/// MIME type for a known media extension (case-insensitive).
pub fn content_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "mp4" => Some("video/mp4"),
        "mov" => Some("video/quicktime"),
        "avi" => Some("video/x-msvideo"),
        _ => None,
    }
}

/// Media file validator
///
/// Checks size, extension and content type against one category's allow lists.
pub struct MediaValidator {
    max_file_size: u64,
    allowed_extensions: Vec<String>,
    allowed_content_types: Vec<String>,
}

impl MediaValidator {
    pub fn new(
        max_file_size: u64,
        allowed_extensions: Vec<String>,
        allowed_content_types: Vec<String>,
    ) -> Self {
        Self {
            max_file_size,
            allowed_extensions,
            allowed_content_types,
        }
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        Ok(())
    }

    /// Validate file extension
    pub fn validate_extension(&self, filename: &str) -> Result<(), ValidationError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| ValidationError::InvalidFilename(filename.to_string()))?;

        if !self.allowed_extensions.contains(&extension) {
            return Err(ValidationError::InvalidExtension {
                extension,
                allowed: self.allowed_extensions.clone(),
            });
        }

        Ok(())
    }

    /// Validate content type
    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationError> {
        let normalized = content_type.trim().to_lowercase();

        if !self
            .allowed_content_types
            .iter()
            .any(|ct| ct == &normalized)
        {
            return Err(ValidationError::UnsupportedType {
                content_type: content_type.to_string(),
                accepted: self.allowed_content_types.clone(),
            });
        }

        Ok(())
    }

    /// Validate all aspects of a file
    pub fn validate_all(
        &self,
        filename: &str,
        content_type: &str,
        file_size: u64,
    ) -> Result<(), ValidationError> {
        self.validate_file_size(file_size)?;
        self.validate_content_type(content_type)?;
        self.validate_extension(filename)?;
        Ok(())
    }
}

/// Create validator for a media category
pub fn validator_for_category(category: MediaCategory, max_file_size: u64) -> MediaValidator {
    let (extensions, content_types) = match category {
        MediaCategory::Image => (IMAGE_EXTENSIONS, IMAGE_CONTENT_TYPES),
        MediaCategory::Video => (VIDEO_EXTENSIONS, VIDEO_CONTENT_TYPES),
    };

    MediaValidator::new(
        max_file_size,
        extensions.iter().map(|s| s.to_string()).collect(),
        content_types.iter().map(|s| s.to_string()).collect(),
    )
}

/// Which media categories an upload control accepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceptPolicy {
    /// Images and videos
    #[default]
    Media,
    /// Videos only
    Video,
}

impl AcceptPolicy {
    pub fn categories(&self) -> &'static [MediaCategory] {
        match self {
            AcceptPolicy::Media => &[MediaCategory::Image, MediaCategory::Video],
            AcceptPolicy::Video => &[MediaCategory::Video],
        }
    }

    pub fn accepts(&self, category: MediaCategory) -> bool {
        self.categories().contains(&category)
    }

    /// Every content type accepted under this policy.
    pub fn content_types(&self) -> Vec<String> {
        self.categories()
            .iter()
            .flat_map(|category| match category {
                MediaCategory::Image => IMAGE_CONTENT_TYPES,
                MediaCategory::Video => VIDEO_CONTENT_TYPES,
            })
            .map(|s| s.to_string())
            .collect()
    }
}

impl FromStr for AcceptPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "media" | "all" => Ok(AcceptPolicy::Media),
            "video" | "video-only" => Ok(AcceptPolicy::Video),
            _ => Err(anyhow::anyhow!("Invalid accept policy: {}", s)),
        }
    }
}

impl Display for AcceptPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AcceptPolicy::Media => write!(f, "media"),
            AcceptPolicy::Video => write!(f, "video"),
        }
    }
}

/// Accepted categories plus the size limit for one upload control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    accept: AcceptPolicy,
    max_file_size: u64,
}

impl UploadPolicy {
    /// `max_file_size` is capped at [`MAX_UPLOAD_SIZE_BYTES`].
    pub fn new(accept: AcceptPolicy, max_file_size: u64) -> Self {
        Self {
            accept,
            max_file_size: max_file_size.min(MAX_UPLOAD_SIZE_BYTES),
        }
    }

    /// Images and videos up to 100 MiB.
    pub fn media() -> Self {
        Self::new(AcceptPolicy::Media, MAX_UPLOAD_SIZE_BYTES)
    }

    /// Videos only, up to 100 MiB.
    pub fn video_only() -> Self {
        Self::new(AcceptPolicy::Video, MAX_UPLOAD_SIZE_BYTES)
    }

    pub fn accept(&self) -> AcceptPolicy {
        self.accept
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn requires_video(&self) -> bool {
        self.accept == AcceptPolicy::Video
    }

    /// Validate a candidate and turn it into a [`MediaFile`].
    ///
    /// Size is checked before type, so an oversized file is rejected whatever
    /// its MIME type.
    pub fn validate(&self, candidate: MediaCandidate) -> Result<MediaFile, ValidationError> {
        let size = candidate.size();
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        let category = MediaCategory::from_content_type(&candidate.content_type)
            .filter(|category| self.accept.accepts(*category))
            .ok_or_else(|| ValidationError::UnsupportedType {
                content_type: candidate.content_type.clone(),
                accepted: self.accept.content_types(),
            })?;

        validator_for_category(category, self.max_file_size).validate_all(
            &candidate.name,
            &candidate.content_type,
            size,
        )?;

        Ok(MediaFile::new(
            candidate.name,
            candidate.content_type.trim().to_lowercase(),
            category,
            candidate.data,
        ))
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::media()
    }
}

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter, Result as FmtResult};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::AppError;
use crate::validation::{content_type_for_extension, ValidationError};

/// Media category enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Image,
    Video,
}

impl MediaCategory {
    /// Category of a MIME type, judged by its top-level type only.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let top_level = content_type.split('/').next()?.trim().to_lowercase();
        match top_level.as_str() {
            "image" => Some(MediaCategory::Image),
            "video" => Some(MediaCategory::Video),
            _ => None,
        }
    }
}

impl Display for MediaCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaCategory::Image => write!(f, "image"),
            MediaCategory::Video => write!(f, "video"),
        }
    }
}

/// A file offered for upload that has not been validated yet.
#[derive(Clone)]
pub struct MediaCandidate {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl MediaCandidate {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Read a local file and infer its MIME type from the extension.
    ///
    /// Files larger than `max_size` are rejected from their metadata, before
    /// any content is read. Unknown extensions get `application/octet-stream`
    /// and are left for the upload policy to reject.
    pub fn from_path(path: impl AsRef<Path>, max_size: u64) -> Result<Self, AppError> {
        let path = path.as_ref();
        let read_error = |e: std::io::Error| {
            AppError::InvalidInput(format!("Failed to read file {}: {}", path.display(), e))
        };

        let file = File::open(path).map_err(read_error)?;
        let size = file.metadata().map_err(read_error)?.len();
        if size > max_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: max_size,
            }
            .into());
        }

        let mut data = Vec::with_capacity(size as usize);
        file.take(max_size.saturating_add(1))
            .read_to_end(&mut data)
            .map_err(read_error)?;
        if data.len() as u64 > max_size {
            return Err(ValidationError::FileTooLarge {
                size: data.len() as u64,
                max: max_size,
            }
            .into());
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let content_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(content_type_for_extension)
            .unwrap_or("application/octet-stream");

        Ok(Self::new(name, content_type, Bytes::from(data)))
    }
}

impl fmt::Debug for MediaCandidate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MediaCandidate")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.size())
            .finish()
    }
}

/// A validated media file, ready to be submitted for analysis.
///
/// Only [`crate::validation::UploadPolicy::validate`] creates these, so a
/// `MediaFile` always has an accepted type and an allowed size.
#[derive(Clone, PartialEq)]
pub struct MediaFile {
    name: String,
    content_type: String,
    category: MediaCategory,
    data: Bytes,
}

impl MediaFile {
    pub(crate) fn new(
        name: String,
        content_type: String,
        category: MediaCategory,
        data: Bytes,
    ) -> Self {
        Self {
            name,
            content_type,
            category,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn category(&self) -> MediaCategory {
        self.category
    }

    pub fn is_video(&self) -> bool {
        self.category == MediaCategory::Video
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// File contents. Cloning the returned `Bytes` does not copy the payload.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Size in megabytes with two decimals, e.g. `"40.00 MB"`.
    pub fn display_size(&self) -> String {
        format!("{:.2} MB", self.size() as f64 / (1024.0 * 1024.0))
    }
}

impl fmt::Debug for MediaFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MediaFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("category", &self.category)
            .field("size", &self.size())
            .finish()
    }
}

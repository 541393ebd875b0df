//! Upload control: stages a single validated file and its inline preview.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

use crate::models::{MediaCandidate, MediaFile};
use crate::validation::{UploadPolicy, ValidationError};

/// Local preview of a staged file, suitable for an inline image or video source.
///
/// Holds a shared handle to the file bytes; the `data:` URL is only built when asked for.
#[derive(Clone, PartialEq)]
pub struct Preview {
    content_type: String,
    data: Bytes,
}

impl Preview {
    pub fn for_file(file: &MediaFile) -> Self {
        Self {
            content_type: file.content_type().to_string(),
            data: file.data().clone(),
        }
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// `data:<mime>;base64,<payload>`
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            STANDARD.encode(&self.data)
        )
    }
}

impl std::fmt::Debug for Preview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preview")
            .field("content_type", &self.content_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
struct StagedFile {
    file: MediaFile,
    preview: Preview,
}

/// Holds at most one staged file. A new selection replaces the previous one.
#[derive(Debug, Clone)]
pub struct UploadControl {
    policy: UploadPolicy,
    staged: Option<StagedFile>,
}

impl UploadControl {
    pub fn new(policy: UploadPolicy) -> Self {
        Self {
            policy,
            staged: None,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Validate and stage `candidate`.
    ///
    /// On rejection the previously staged file, if any, stays in place.
    pub fn select_file(&mut self, candidate: MediaCandidate) -> Result<&MediaFile, ValidationError> {
        let name = candidate.name.clone();
        let file = match self.policy.validate(candidate) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(filename = %name, error = %e, "Rejected file selection");
                return Err(e);
            }
        };

        tracing::debug!(
            filename = %file.name(),
            content_type = %file.content_type(),
            size = file.size(),
            "Staged file for analysis"
        );

        let preview = Preview::for_file(&file);
        let staged = self.staged.insert(StagedFile { file, preview });
        Ok(&staged.file)
    }

    /// Clear the staged file and its preview. Safe to call when nothing is staged.
    pub fn remove_file(&mut self) {
        if let Some(staged) = self.staged.take() {
            tracing::debug!(filename = %staged.file.name(), "Removed staged file");
        }
    }

    pub fn staged(&self) -> Option<&MediaFile> {
        self.staged.as_ref().map(|s| &s.file)
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.staged.as_ref().map(|s| &s.preview)
    }
}

impl Default for UploadControl {
    fn default() -> Self {
        Self::new(UploadPolicy::default())
    }
}

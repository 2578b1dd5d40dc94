//! Attachment validation.
//!
//! Checks a candidate file against the configured [`AttachmentPolicy`] before
//! any send is attempted. Validation is pure: it only inspects metadata.

use thiserror::Error;

use crate::config::{AttachmentPolicy, MAX_ATTACHMENT_BYTES};
use crate::domain::AttachmentRef;
use crate::providers::OutgoingAttachment;

/// Reasons a file may not be attached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachmentError {
    /// The file exceeds the size limit.
    #[error("attachment is {size} bytes, limit is {max} bytes")]
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Accepted maximum in bytes.
        max: u64,
    },

    /// The file extension is not on the allow-list.
    #[error("attachment type '{extension}' is not supported")]
    UnsupportedType {
        /// Offending extension, lowercased. Empty if the file has none.
        extension: String,
    },
}

/// A file the user wants to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentCandidate {
    /// File name including extension.
    pub file_name: String,
    /// Size in bytes as reported by the file system. Validation also
    /// checks the length of `data`, whichever is larger.
    pub size_bytes: u64,
    /// File contents, uploaded only after validation passes.
    pub data: Vec<u8>,
}

impl AttachmentCandidate {
    /// Creates a candidate from in-memory contents.
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            size_bytes: data.len() as u64,
            data,
        }
    }

    /// Returns the larger of the reported size and the payload length.
    pub fn effective_size(&self) -> u64 {
        self.size_bytes.max(self.data.len() as u64)
    }

    /// Returns the lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Converts into the upload payload once validated.
    pub(crate) fn into_outgoing(self, attachment: &AttachmentRef) -> OutgoingAttachment {
        OutgoingAttachment {
            file_name: attachment.file_name.clone(),
            content_type: attachment.content_type.clone(),
            data: self.data,
        }
    }
}

/// Validates attachments against a policy.
#[derive(Debug, Clone)]
pub struct AttachmentValidator {
    max_size_bytes: u64,
    allowed_extensions: Vec<String>,
}

impl Default for AttachmentValidator {
    fn default() -> Self {
        Self::new(&AttachmentPolicy::default())
    }
}

impl AttachmentValidator {
    /// Creates a validator. The size limit never exceeds 10 MiB.
    pub fn new(policy: &AttachmentPolicy) -> Self {
        Self {
            max_size_bytes: policy.max_size_bytes.min(MAX_ATTACHMENT_BYTES),
            allowed_extensions: policy
                .allowed_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Returns the effective size limit in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Validates a candidate file.
    ///
    /// Size is checked first, so an oversized file of an unsupported type
    /// reports `TooLarge`. The payload length counts even when the reported
    /// size is smaller.
    pub fn validate(&self, candidate: &AttachmentCandidate) -> Result<AttachmentRef, AttachmentError> {
        let size = candidate.effective_size();
        if size > self.max_size_bytes {
            return Err(AttachmentError::TooLarge {
                size,
                max: self.max_size_bytes,
            });
        }

        let extension = candidate.extension().unwrap_or_default();
        if extension.is_empty() || !self.allowed_extensions.contains(&extension) {
            return Err(AttachmentError::UnsupportedType { extension });
        }

        Ok(AttachmentRef {
            file_name: candidate.file_name.clone(),
            content_type: content_type_for(&extension).to_string(),
            size_bytes: size,
        })
    }
}

/// Maps an allowed extension to its MIME type.
fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "txt" => "text/plain",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn candidate(name: &str, size: u64) -> AttachmentCandidate {
        AttachmentCandidate {
            file_name: name.to_string(),
            size_bytes: size,
            data: Vec::new(),
        }
    }

    #[test]
    fn accepts_allowed_document() {
        let validator = AttachmentValidator::default();
        let attachment = validator.validate(&candidate("lease.pdf", 2 * MIB)).unwrap();
        assert_eq!(attachment.content_type, "application/pdf");
        assert_eq!(attachment.size_bytes, 2 * MIB);
    }

    #[test]
    fn exactly_ten_mib_is_accepted() {
        let validator = AttachmentValidator::default();
        assert!(validator.validate(&candidate("photo.jpg", 10 * MIB)).is_ok());
    }

    #[test]
    fn eleven_mib_is_too_large() {
        let validator = AttachmentValidator::default();
        let err = validator
            .validate(&candidate("photo.jpg", 11 * MIB))
            .unwrap_err();
        assert_eq!(
            err,
            AttachmentError::TooLarge {
                size: 11 * MIB,
                max: 10 * MIB
            }
        );
    }

    #[test]
    fn payload_length_overrides_understated_size() {
        let validator = AttachmentValidator::default();
        let understated = AttachmentCandidate {
            file_name: "big.pdf".to_string(),
            size_bytes: 1,
            data: vec![0; (11 * MIB) as usize],
        };

        let err = validator.validate(&understated).unwrap_err();

        assert_eq!(
            err,
            AttachmentError::TooLarge {
                size: 11 * MIB,
                max: 10 * MIB
            }
        );
    }

    #[test]
    fn recorded_size_matches_payload() {
        let validator = AttachmentValidator::default();
        let candidate = AttachmentCandidate {
            file_name: "notes.txt".to_string(),
            size_bytes: 2,
            data: b"hello".to_vec(),
        };

        let attachment = validator.validate(&candidate).unwrap();
        assert_eq!(attachment.size_bytes, 5);
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let validator = AttachmentValidator::default();
        let attachment = validator.validate(&candidate("FLOOR.PNG", 10)).unwrap();
        assert_eq!(attachment.content_type, "image/png");
    }

    #[test]
    fn rejects_unsupported_type() {
        let validator = AttachmentValidator::default();
        let err = validator.validate(&candidate("setup.exe", 10)).unwrap_err();
        assert_eq!(
            err,
            AttachmentError::UnsupportedType {
                extension: "exe".to_string()
            }
        );
    }

    #[test]
    fn rejects_missing_extension() {
        let validator = AttachmentValidator::default();
        assert!(matches!(
            validator.validate(&candidate("README", 10)),
            Err(AttachmentError::UnsupportedType { .. })
        ));
        assert!(matches!(
            validator.validate(&candidate(".pdf", 10)),
            Err(AttachmentError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn policy_cannot_raise_limit_above_ten_mib() {
        let policy = AttachmentPolicy {
            max_size_bytes: 50 * MIB,
            ..Default::default()
        };
        assert_eq!(AttachmentValidator::new(&policy).max_size_bytes(), 10 * MIB);
    }

    #[test]
    fn custom_allow_list() {
        let policy = AttachmentPolicy {
            max_size_bytes: MIB,
            allowed_extensions: vec![".CSV".to_string()],
        };
        let validator = AttachmentValidator::new(&policy);
        assert!(validator.validate(&candidate("data.csv", 10)).is_ok());
        assert!(validator.validate(&candidate("doc.pdf", 10)).is_err());
    }

    #[test]
    fn candidate_size_comes_from_data() {
        let candidate = AttachmentCandidate::new("note.txt", b"hello".to_vec());
        assert_eq!(candidate.size_bytes, 5);
        assert_eq!(candidate.extension().as_deref(), Some("txt"));
    }
}

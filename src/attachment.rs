//
// Copyright © 2025 Hardcore Engineering Inc.
//
// Licensed under the Eclipse Public License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License. You may
// obtain a copy of the License at https://www.eclipse.org/legal/epl-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//
// See the License for the specific language governing permissions and
// limitations under the License.
//

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::document::{Field, ValidationError};
use crate::{Error, Result};

/// Largest accepted upload, inclusive.
pub const MAX_ATTACHMENT_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum AttachmentKind {
    #[strum(to_string = "image/jpeg", serialize = "image/jpg")]
    Jpeg,
    #[strum(to_string = "image/png")]
    Png,
    #[strum(to_string = "image/gif")]
    Gif,
    #[strum(to_string = "application/pdf")]
    Pdf,
}

impl AttachmentKind {
    pub fn from_extension(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();

        match extension.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Stored form of a file: base64 payload plus its name and MIME type.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_name: String,
    pub file_content: String,
    pub file_type: String,
}

impl Attachment {
    pub fn decode(&self) -> Result<Vec<u8>> {
        // payloads written by the browser client carry a data URL prefix
        let payload = match self.file_content.split_once(";base64,") {
            Some((_, data)) => data,
            None => &self.file_content,
        };

        Ok(STANDARD.decode(payload.trim())?)
    }
}

/// A file picked by the user, before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl AttachmentUpload {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let kind = AttachmentKind::from_extension(path).ok_or_else(|| {
            Error::Validation(vec![ValidationError::new(
                Field::File,
                "only JPEG, PNG, GIF and PDF files are accepted",
            )])
        })?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or(Error::Other("Attachment path has no file name"))?;

        Ok(Self::new(file_name, kind.to_string(), std::fs::read(path)?))
    }

    pub fn validate(&self) -> std::result::Result<AttachmentKind, ValidationError> {
        let kind = self
            .mime_type
            .parse::<AttachmentKind>()
            .map_err(|_| {
                ValidationError::new(
                    Field::File,
                    format!("unsupported file type {}", self.mime_type),
                )
            })?;

        if self.bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(ValidationError::new(
                Field::File,
                format!(
                    "file is {} bytes, the limit is {} bytes",
                    self.bytes.len(),
                    MAX_ATTACHMENT_BYTES
                ),
            ));
        }

        if self.file_name.trim().is_empty() {
            return Err(ValidationError::new(Field::File, "file name is empty"));
        }

        Ok(kind)
    }

    pub fn encode(&self) -> std::result::Result<Attachment, ValidationError> {
        let kind = self.validate()?;

        Ok(Attachment {
            file_name: self.file_name.clone(),
            file_content: STANDARD.encode(&self.bytes),
            file_type: kind.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limit_is_inclusive() {
        let exact = AttachmentUpload::new("scan.pdf", "application/pdf", vec![0u8; MAX_ATTACHMENT_BYTES]);
        assert_eq!(exact.validate(), Ok(AttachmentKind::Pdf));

        let over = AttachmentUpload::new(
            "scan.pdf",
            "application/pdf",
            vec![0u8; 51 * 1024 * 1024],
        );
        let error = over.validate().unwrap_err();
        assert_eq!(error.field, Field::File);
    }

    #[test]
    fn test_mime_whitelist() {
        for mime in ["image/jpeg", "image/jpg", "image/png", "image/gif", "application/pdf"] {
            assert!(AttachmentUpload::new("a", mime, vec![1]).validate().is_ok(), "{mime}");
        }

        for mime in ["text/plain", "image/webp", "application/zip", ""] {
            assert!(AttachmentUpload::new("a", mime, vec![1]).validate().is_err(), "{mime}");
        }
    }

    #[test]
    fn test_encode_decode() {
        let upload = AttachmentUpload::new("photo.jpg", "image/jpg", b"\xff\xd8\xff\xe0".to_vec());
        let attachment = upload.encode().unwrap();

        assert_eq!(attachment.file_type, "image/jpeg");
        assert_eq!(attachment.file_content, "/9j/4A==");
        assert_eq!(attachment.decode().unwrap(), upload.bytes);
    }

    #[test]
    fn test_decode_data_url() {
        let attachment = Attachment {
            file_name: String::from("memo.pdf"),
            file_content: String::from("data:application/pdf;base64,JVBERi0="),
            file_type: String::from("application/pdf"),
        };

        assert_eq!(attachment.decode().unwrap(), b"%PDF-");
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(
            AttachmentKind::from_extension(Path::new("/tmp/Scan.JPG")),
            Some(AttachmentKind::Jpeg)
        );
        assert_eq!(
            AttachmentKind::from_extension(Path::new("letter.pdf")),
            Some(AttachmentKind::Pdf)
        );
        assert_eq!(AttachmentKind::from_extension(Path::new("notes.txt")), None);
        assert_eq!(AttachmentKind::from_extension(Path::new("README")), None);
    }
}

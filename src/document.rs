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

use chrono::{NaiveDate, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::attachment::{Attachment, AttachmentUpload};

pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Offset between Buddhist-Era and Gregorian years.
pub const BUDDHIST_ERA_OFFSET: i32 = 543;

static COUNT: AtomicUsize = AtomicUsize::new(0);
static RANDOM: LazyLock<String> = LazyLock::new(|| {
    format!(
        "{:06X}{:04X}",
        rand::random::<u32>() >> 8,
        rand::random::<u32>() >> 16
    )
});

/// Time-based document id: millisecond timestamp, per-process random part, counter.
pub(crate) fn generate_id() -> String {
    let count = COUNT.fetch_add(1, Ordering::Relaxed);
    let timestamp = Utc::now().timestamp_millis().max(0);

    format!("{timestamp:X}{}{count}", &*RANDOM)
}

/// Parses a `DD/MM/YYYY` Buddhist-Era date into its Gregorian calendar day.
pub fn parse_be_date(value: &str) -> Option<NaiveDate> {
    let bytes = value.as_bytes();

    if !value.is_ascii() || bytes.len() != 10 || bytes[2] != b'/' || bytes[5] != b'/' {
        return None;
    }

    let digits = |range: std::ops::Range<usize>| -> Option<u32> {
        let part = &value[range];
        part.bytes()
            .all(|b| b.is_ascii_digit())
            .then(|| part.parse().ok())
            .flatten()
    };

    let day = digits(0..2)?;
    let month = digits(3..5)?;
    let year = digits(6..10)? as i32 - BUDDHIST_ERA_OFFSET;

    NaiveDate::from_ymd_opt(year, month, day)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "camelCase")]
pub enum Field {
    DocNumber,
    Source,
    Subject,
    DocDate,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: Field,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Form contents for a new or edited document.
#[derive(Debug, Clone, Default, Builder)]
pub struct DocumentInput {
    #[builder(setter(into))]
    pub doc_number: String,

    #[builder(setter(into))]
    pub source: String,

    #[builder(setter(into))]
    pub subject: String,

    #[builder(setter(into))]
    pub doc_date: String,

    #[builder(setter(into), default)]
    pub notes: String,

    /// On update, `None` keeps the stored attachment.
    #[builder(setter(strip_option), default)]
    pub attachment: Option<AttachmentUpload>,
}

impl DocumentInput {
    /// Collects every field problem at once so the whole form can be reported.
    pub fn validate(&self) -> crate::Result<()> {
        let mut errors = Vec::new();

        for (field, value) in [
            (Field::DocNumber, &self.doc_number),
            (Field::Source, &self.source),
            (Field::Subject, &self.subject),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError::new(field, "required"));
            }
        }

        if self.doc_date.trim().is_empty() {
            errors.push(ValidationError::new(Field::DocDate, "required"));
        } else if parse_be_date(&self.doc_date).is_none() {
            errors.push(ValidationError::new(
                Field::DocDate,
                "expected a Buddhist-Era date as DD/MM/YYYY",
            ));
        }

        if let Some(Err(error)) = self.attachment.as_ref().map(AttachmentUpload::validate) {
            errors.push(error);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(crate::Error::Validation(errors))
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", try_from = "RawDocument")]
pub struct Document {
    id: String,
    pub doc_number: String,
    pub source: String,
    pub subject: String,
    pub doc_date: String,
    pub notes: String,
    pub tags: Vec<String>,
    created_at: Timestamp,

    #[serde(flatten)]
    pub attachment: Option<Attachment>,
}

impl Document {
    pub(crate) fn new(
        input: &DocumentInput,
        tags: Vec<String>,
        attachment: Option<Attachment>,
    ) -> Self {
        Self {
            id: generate_id(),
            doc_number: input.doc_number.trim().to_owned(),
            source: input.source.trim().to_owned(),
            subject: input.subject.trim().to_owned(),
            doc_date: input.doc_date.trim().to_owned(),
            notes: input.notes.trim().to_owned(),
            tags,
            created_at: Utc::now(),
            attachment,
        }
    }

    /// Replaces the editable fields; `id`, `created_at` and tags are kept, the
    /// attachment only when `attachment` is `None`.
    pub(crate) fn merged(&self, input: &DocumentInput, attachment: Option<Attachment>) -> Self {
        Self {
            id: self.id.clone(),
            doc_number: input.doc_number.trim().to_owned(),
            source: input.source.trim().to_owned(),
            subject: input.subject.trim().to_owned(),
            doc_date: input.doc_date.trim().to_owned(),
            notes: input.notes.trim().to_owned(),
            tags: self.tags.clone(),
            created_at: self.created_at,
            attachment: attachment.or_else(|| self.attachment.clone()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Gregorian calendar day of `doc_date`.
    pub fn date(&self) -> Option<NaiveDate> {
        parse_be_date(&self.doc_date)
    }

    #[cfg(test)]
    pub(crate) fn with_created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = created_at;
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Tags {
    List(Vec<String>),
    Joined(String),
}

impl Default for Tags {
    fn default() -> Self {
        Tags::List(Vec::new())
    }
}

impl From<Tags> for Vec<String> {
    fn from(tags: Tags) -> Self {
        let tags = match tags {
            Tags::List(list) => list,
            Tags::Joined(joined) => joined.split(',').map(str::to_owned).collect(),
        };

        tags.into_iter()
            .map(|tag| tag.trim().to_owned())
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}

/// Spreadsheet cells come back as numbers or blanks as often as strings.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(string) => string,
        other => other.to_string(),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    doc_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    source: String,
    #[serde(default, deserialize_with = "lenient_string")]
    subject: String,
    #[serde(default, deserialize_with = "lenient_string")]
    doc_date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    notes: String,
    #[serde(default)]
    tags: Option<Tags>,
    created_at: Timestamp,
    #[serde(default, deserialize_with = "lenient_string")]
    file_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    file_content: String,
    #[serde(default, deserialize_with = "lenient_string")]
    file_type: String,
}

impl TryFrom<RawDocument> for Document {
    type Error = String;

    fn try_from(raw: RawDocument) -> Result<Self, Self::Error> {
        if raw.id.trim().is_empty() {
            return Err(String::from("document without id"));
        }

        let attachment = match (
            raw.file_name.is_empty(),
            raw.file_content.is_empty(),
            raw.file_type.is_empty(),
        ) {
            (true, true, true) => None,
            (false, false, false) => Some(Attachment {
                file_name: raw.file_name,
                file_content: raw.file_content,
                file_type: raw.file_type,
            }),
            _ => return Err(format!("document {} has an incomplete attachment", raw.id)),
        };

        Ok(Document {
            id: raw.id,
            doc_number: raw.doc_number,
            source: raw.source,
            subject: raw.subject,
            doc_date: raw.doc_date,
            notes: raw.notes,
            tags: raw.tags.unwrap_or_default().into(),
            created_at: raw.created_at,
            attachment,
        })
    }
}

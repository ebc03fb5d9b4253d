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

pub mod attachment;
pub mod cache;
mod config;
pub mod document;
pub mod repository;
pub mod search;
pub mod services;
pub mod session;

pub use attachment::{Attachment, AttachmentKind, AttachmentUpload};
pub use cache::{CacheStorage, SqliteCache};
pub use config::{Config, ConfigBuilder, ConfigBuilderError};
pub use document::{Document, DocumentInput, DocumentInputBuilder, Field, ValidationError};
pub use repository::Repository;
pub use search::{Direction, SortKey, SortState};
pub use services::store::{Action, RemoteStore, StoreClient};
pub use services::tagging::{Tagger, TaggingClient};
pub use session::{Notice, Session, Severity};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ValidationError: {}", join_fields(.0))]
    Validation(Vec<ValidationError>),

    #[error("SyncError: {0}")]
    Sync(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("TaggingError: {0}")]
    Tagging(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Cache(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Config(#[from] ::config::ConfigError),

    #[error("{0}")]
    Other(&'static str),
}

fn join_fields(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;

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

use tracing::*;

use crate::cache::CacheStorage;
use crate::document::{Document, DocumentInput};
use crate::repository::Repository;
use crate::search::{self, SortKey, SortState};
use crate::services::store::RemoteStore;
use crate::services::tagging::Tagger;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Transient message for the user about the outcome of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl From<&Error> for Notice {
    fn from(error: &Error) -> Self {
        match error {
            Error::Validation(errors) => Notice::warning(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Error::NotFound(id) => Notice::warning(format!("Document {id} no longer exists")),
            Error::Sync(message) => Notice::error(message.clone()),
            other => Notice::error(other.to_string()),
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// Decoded attachment ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Command handlers a front end binds to: each runs one repository
/// operation and reports the outcome as a [`Notice`].
pub struct Session<S, T, C> {
    repository: Repository<S, T, C>,
    query: String,
    sort: Option<SortState>,
    recent_limit: usize,
}

impl<S: RemoteStore, T: Tagger, C: CacheStorage> Session<S, T, C> {
    pub fn new(repository: Repository<S, T, C>, recent_limit: usize) -> Self {
        Self {
            repository,
            query: String::new(),
            sort: None,
            recent_limit,
        }
    }

    pub fn repository(&self) -> &Repository<S, T, C> {
        &self.repository
    }

    /// Initial remote read. A failure keeps the cached collection and is only a warning.
    pub async fn start(&mut self) -> Notice {
        match self.repository.sync().await {
            Ok(count) => Notice::info(format!("Loaded {count} documents")),
            Err(error) => {
                warn!(%error, "Startup sync failed, using cached documents");
                Notice::warning(format!(
                    "Showing {} cached documents: {error}",
                    self.repository.documents().len()
                ))
            }
        }
    }

    pub async fn refresh(&mut self) -> Notice {
        match self.repository.sync().await {
            Ok(count) => Notice::info(format!("Loaded {count} documents")),
            Err(error) => Notice::from(&error),
        }
    }

    pub async fn create(&mut self, input: DocumentInput) -> Notice {
        match self.repository.create(input).await {
            Ok(document) => Notice::info(format!("Saved document {}", document.doc_number)),
            Err(error) => Notice::from(&error),
        }
    }

    pub async fn update(&mut self, id: &str, input: DocumentInput) -> Notice {
        match self.repository.update(id, input).await {
            Ok(document) => Notice::info(format!("Updated document {}", document.doc_number)),
            Err(error) => Notice::from(&error),
        }
    }

    pub async fn delete(&mut self, id: &str) -> Notice {
        match self.repository.delete(id).await {
            Ok(document) => Notice::info(format!("Deleted document {}", document.doc_number)),
            Err(error) => Notice::from(&error),
        }
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// First click on a column sorts it descending, later clicks flip it.
    pub fn toggle_sort(&mut self, key: SortKey) -> SortState {
        let state = match self.sort {
            Some(mut state) => {
                state.toggle(key);
                state
            }
            None => SortState {
                key,
                direction: search::Direction::Descending,
            },
        };

        self.sort = Some(state);
        state
    }

    pub fn sort(&self) -> Option<SortState> {
        self.sort
    }

    /// Documents to show for the current query and column ordering.
    pub fn visible(&self) -> Vec<&Document> {
        let found = search::search(self.repository.documents(), &self.query, self.recent_limit);

        match self.sort {
            Some(state) => state.apply(found),
            None => found,
        }
    }

    pub fn download(&self, id: &str) -> Result<Download> {
        let attachment = self
            .repository
            .get(id)
            .and_then(|document| document.attachment.as_ref())
            .ok_or_else(|| Error::NotFound(id.to_owned()))?;

        Ok(Download {
            file_name: attachment.file_name.clone(),
            mime_type: attachment.file_type.clone(),
            bytes: attachment.decode()?,
        })
    }
}

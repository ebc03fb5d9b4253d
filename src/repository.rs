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

use crate::attachment::Attachment;
use crate::cache::CacheStorage;
use crate::document::{Document, DocumentInput};
use crate::services::store::RemoteStore;
use crate::services::tagging::Tagger;
use crate::{Error, Result};

/// Session-owned document collection.
///
/// Every mutation is remote-first: memory and the local cache change only
/// after the store has accepted the write, so a failed call leaves both as
/// they were.
pub struct Repository<S, T, C> {
    store: S,
    tagger: T,
    cache: C,
    documents: Vec<Document>,
    tagging_required: bool,
}

impl<S: RemoteStore, T: Tagger, C: CacheStorage> Repository<S, T, C> {
    /// Seeds the collection from the cache. An unreadable cache starts empty.
    pub fn open(store: S, tagger: T, cache: C) -> Self {
        let documents = match cache.load() {
            Ok(documents) => documents.unwrap_or_default(),
            Err(error) => {
                warn!(%error, "Cannot read local cache, starting empty");
                Vec::new()
            }
        };

        debug!(count = documents.len(), "seeded from cache");

        Self {
            store,
            tagger,
            cache,
            documents,
            tagging_required: false,
        }
    }

    pub fn with_tagging_required(mut self, required: bool) -> Self {
        self.tagging_required = required;
        self
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|document| document.id() == id)
    }

    pub async fn create(&mut self, input: DocumentInput) -> Result<Document> {
        input.validate()?;
        let attachment = encode(&input)?;

        let tags = self.tag(&input).await?;
        let document = Document::new(&input, tags, attachment);

        self.store.create(&document).await?;

        debug!(id = document.id(), "created");

        self.documents.insert(0, document.clone());
        self.persist();

        Ok(document)
    }

    pub async fn update(&mut self, id: &str, input: DocumentInput) -> Result<Document> {
        input.validate()?;
        let attachment = encode(&input)?;

        let document = self
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_owned()))?
            .merged(&input, attachment);

        self.store.update(&document).await?;

        debug!(id, "updated");

        if let Some(slot) = self.documents.iter_mut().find(|d| d.id() == id) {
            *slot = document.clone();
        }
        self.persist();

        Ok(document)
    }

    pub async fn delete(&mut self, id: &str) -> Result<Document> {
        if self.get(id).is_none() {
            return Err(Error::NotFound(id.to_owned()));
        }

        self.store.delete(id).await?;

        debug!(id, "deleted");

        let position = self
            .documents
            .iter()
            .position(|d| d.id() == id)
            .ok_or_else(|| Error::NotFound(id.to_owned()))?;
        let removed = self.documents.remove(position);
        self.persist();

        Ok(removed)
    }

    /// Replaces the collection with the remote one. Remote wins unconditionally.
    pub async fn sync(&mut self) -> Result<usize> {
        let documents = self.store.read().await?;

        debug!(count = documents.len(), "synced");

        self.documents = documents;
        self.persist();

        Ok(self.documents.len())
    }

    async fn tag(&self, input: &DocumentInput) -> Result<Vec<String>> {
        match self.tagger.tags(&input.subject, &input.notes).await {
            Ok(tags) => Ok(tags),
            Err(error) if !self.tagging_required => {
                warn!(%error, "Tagging failed, saving without tags");
                Ok(Vec::new())
            }
            Err(error) => Err(error),
        }
    }

    /// The remote write has already been committed, so a cache failure is
    /// logged rather than reported as a failed operation.
    fn persist(&self) {
        if let Err(error) = self.cache.store(&self.documents) {
            error!(%error, "Cannot write local cache");
        }
    }
}

fn encode(input: &DocumentInput) -> Result<Option<Attachment>> {
    input
        .attachment
        .as_ref()
        .map(|upload| upload.encode().map_err(|error| Error::Validation(vec![error])))
        .transpose()
}

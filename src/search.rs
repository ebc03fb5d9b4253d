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

//! Filtering and ordering of the in-memory collection for presentation.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::document::Document;

pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Case-insensitive substring match over the text fields, the attachment name
/// and the tags. A blank query yields the `limit` most recently created documents.
pub fn search<'a>(documents: &'a [Document], query: &str, limit: usize) -> Vec<&'a Document> {
    let query = query.trim().to_lowercase();

    if query.is_empty() {
        return recent(documents, limit);
    }

    documents
        .iter()
        .filter(|document| matches(document, &query))
        .collect()
}

pub fn recent(documents: &[Document], limit: usize) -> Vec<&Document> {
    let mut recent = sort(documents, SortKey::CreatedAt, Direction::Descending);
    recent.truncate(limit);
    recent
}

fn matches(document: &Document, query: &str) -> bool {
    let contains = |value: &str| value.to_lowercase().contains(query);

    contains(&document.subject)
        || contains(&document.doc_number)
        || contains(&document.source)
        || contains(&document.notes)
        || document
            .attachment
            .as_ref()
            .is_some_and(|attachment| contains(&attachment.file_name))
        || document.tags.iter().any(|tag| contains(tag))
}

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum SortKey {
    DocNumber,
    DocDate,
    Source,
    Subject,
    Notes,
    CreatedAt,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn flip(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }
}

/// Column ordering as driven by a table header.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub key: SortKey,
    pub direction: Direction,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            key: SortKey::CreatedAt,
            direction: Direction::Descending,
        }
    }
}

impl SortState {
    /// Same key flips the direction, a new key starts descending.
    pub fn toggle(&mut self, key: SortKey) {
        if self.key == key {
            self.direction = self.direction.flip();
        } else {
            self.key = key;
            self.direction = Direction::Descending;
        }
    }

    pub fn apply<'a>(&self, documents: impl IntoIterator<Item = &'a Document>) -> Vec<&'a Document> {
        sort(documents, self.key, self.direction)
    }
}

/// Stable sort; equal elements keep their incoming order in both directions.
pub fn sort<'a>(
    documents: impl IntoIterator<Item = &'a Document>,
    key: SortKey,
    direction: Direction,
) -> Vec<&'a Document> {
    let mut sorted = documents.into_iter().collect::<Vec<_>>();

    sorted.sort_by(|a, b| {
        let ordering = compare(a, b, key);
        match direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    });

    sorted
}

fn compare(a: &Document, b: &Document, key: SortKey) -> Ordering {
    match key {
        // unparsable dates order before every real date
        SortKey::DocDate => a.date().cmp(&b.date()),
        SortKey::CreatedAt => a.created_at().cmp(&b.created_at()),
        SortKey::DocNumber => collate(&a.doc_number, &b.doc_number),
        SortKey::Source => collate(&a.source, &b.source),
        SortKey::Subject => collate(&a.subject, &b.subject),
        SortKey::Notes => collate(&a.notes, &b.notes),
    }
}

/// Thai dictionary order: case folded, with the preposed vowels เ แ โ ใ ไ
/// ranked after the consonant they are written before.
fn collation_key(value: &str) -> Vec<char> {
    let mut key = Vec::with_capacity(value.len());
    let mut chars = value.chars().flat_map(char::to_lowercase).peekable();

    while let Some(c) = chars.next() {
        if ('\u{0E40}'..='\u{0E44}').contains(&c) {
            if let Some(consonant) = chars.next() {
                key.push(consonant);
            }
        }
        key.push(c);
    }

    key
}

fn collate(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

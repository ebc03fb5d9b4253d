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

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::*;
use url::Url;

use super::{HttpClient, RequestBuilderExt, ResponseExt};
use crate::config::Config;
use crate::{Error, Result};

pub const MAX_TAGS: usize = 7;

const INSTRUCTIONS: &str = "You index official correspondence. Reply with a JSON array of 5 to 7 \
     short keywords, in the language of the document, that best describe its subject. \
     Reply with the array only.";

/// Produces search keywords for a document about to be filed.
#[allow(async_fn_in_trait)]
pub trait Tagger {
    async fn tags(&self, subject: &str, notes: &str) -> Result<Vec<String>>;
}

/// Unconfigured tagging yields no keywords.
impl<T: Tagger> Tagger for Option<T> {
    async fn tags(&self, subject: &str, notes: &str) -> Result<Vec<String>> {
        match self {
            Some(tagger) => tagger.tags(subject, notes).await,
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct TaggingClient {
    http: HttpClient,
    url: Url,
    token: SecretString,
    model: String,
}

impl TaggingClient {
    pub fn new(config: &Config, token: impl Into<SecretString>) -> Result<Self> {
        let base = config.tagging_url.as_str().trim_end_matches('/');
        let url = Url::parse(&format!("{base}/chat/completions"))?;

        Ok(Self {
            http: super::http_client()?,
            url,
            token: token.into(),
            model: config.tagging_model.clone(),
        })
    }
}

impl Tagger for TaggingClient {
    #[tracing::instrument(level = "debug", skip_all, fields(url = %self.url, model = %self.model))]
    async fn tags(&self, subject: &str, notes: &str) -> Result<Vec<String>> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: String::from("system"),
                    content: String::from(INSTRUCTIONS),
                },
                ChatMessage {
                    role: String::from("user"),
                    content: format!("Subject: {subject}\nNotes: {notes}"),
                },
            ],
            temperature: 0.2,
        };

        let response = self
            .http
            .post(self.url.clone())
            .bearer_auth(self.token.expose_secret())
            .json(&request)
            .send_ext()
            .await
            .map_err(|failure| Error::Tagging(failure.to_string()))?
            .json_body::<ChatResponse>()
            .await
            .map_err(|failure| Error::Tagging(failure.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::Tagging(String::from("No choices in response")))?;

        let tags = parse_keywords(&content)?;

        debug!(?tags, "tagged");

        Ok(tags)
    }
}

/// Accepts a bare JSON array, an object holding `tags` or `keywords`, either
/// optionally wrapped in a markdown code fence.
pub fn parse_keywords(content: &str) -> Result<Vec<String>> {
    let mut body = content.trim();

    if let Some(fenced) = body.strip_prefix("```") {
        let fenced = fenced.split_once('\n').map_or("", |(_, rest)| rest);
        body = fenced.trim_end().trim_end_matches("```").trim();
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|error| Error::Tagging(format!("Cannot parse keywords: {error}")))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("tags").or_else(|| object.remove("keywords")) {
            Some(Value::Array(items)) => items,
            _ => return Err(Error::Tagging(String::from("No keyword list in reply"))),
        },
        _ => return Err(Error::Tagging(String::from("No keyword list in reply"))),
    };

    let mut tags: Vec<String> = Vec::new();

    for item in items {
        let Value::String(tag) = item else { continue };
        let tag = tag.trim();

        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_owned());
        }

        if tags.len() == MAX_TAGS {
            break;
        }
    }

    Ok(tags)
}

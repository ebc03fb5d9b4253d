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

use reqwest::{Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::*;

pub mod store;
pub mod tagging;

pub type HttpClient = ClientWithMiddleware;

pub fn http_client() -> crate::Result<HttpClient> {
    Ok(ClientBuilder::new(reqwest::Client::builder().build()?).build())
}

/// Where an HTTP exchange broke down.
#[derive(Debug, thiserror::Error)]
pub enum HttpFailure {
    /// The request never produced a response.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    #[error("HTTP {0}: {1}")]
    Status(StatusCode, String),

    #[error("cannot read response body: {0}")]
    Body(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl HttpFailure {
    /// The connection failed before a complete response arrived, either
    /// while connecting or part way through the body.
    pub fn is_transport(&self) -> bool {
        match self {
            HttpFailure::Transport(_) => true,
            HttpFailure::Body(error) => error.is_body() || error.is_decode(),
            HttpFailure::Status(..) | HttpFailure::Malformed(_) => false,
        }
    }
}

pub trait RequestBuilderExt {
    fn send_ext(self) -> impl Future<Output = Result<Response, HttpFailure>>;
}

impl RequestBuilderExt for RequestBuilder {
    async fn send_ext(self) -> Result<Response, HttpFailure> {
        let response = self.send().await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await?;

            Err(HttpFailure::Status(status, body))
        }
    }
}

pub trait ResponseExt {
    fn json_body<T: DeserializeOwned>(self) -> impl Future<Output = Result<T, HttpFailure>>;
}

impl ResponseExt for Response {
    async fn json_body<T: DeserializeOwned>(self) -> Result<T, HttpFailure> {
        let body = self.text().await?;

        trace!(%body, "http response");

        serde_json::from_str::<T>(&body).map_err(|error| {
            error!(%body, %error);
            HttpFailure::Malformed(error)
        })
    }
}

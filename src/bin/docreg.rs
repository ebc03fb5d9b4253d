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

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use doc_registry::session::Session;
use doc_registry::{
    AttachmentUpload, Config, Direction, Document, DocumentInput, Repository, Result, Severity,
    SortKey, SqliteCache, StoreClient, TaggingClient,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "docreg")]
#[command(about = "File, search and edit registered documents")]
#[command(version)]
struct Args {
    /// Path to a TOML config file; DOCREG_* environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show documents matching a query, or the most recent ones
    List {
        #[arg(short, long, default_value = "")]
        query: String,

        /// docNumber, docDate, source, subject, notes or createdAt
        #[arg(short, long)]
        sort: Option<SortKey>,

        #[arg(long, requires = "sort")]
        asc: bool,
    },

    /// Register a new document
    Add(Form),

    /// Replace the fields of an existing document
    Edit {
        id: String,

        #[command(flatten)]
        form: Form,
    },

    Delete {
        id: String,
    },

    /// Reload the collection from the remote store
    Sync,

    /// Write a document's attachment to disk
    Download {
        id: String,

        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct Form {
    #[arg(long)]
    number: String,

    #[arg(long)]
    source: String,

    #[arg(long)]
    subject: String,

    /// Buddhist-Era date, DD/MM/YYYY
    #[arg(long)]
    date: String,

    #[arg(long, default_value = "")]
    notes: String,

    /// JPEG, PNG, GIF or PDF, at most 50MB
    #[arg(long)]
    file: Option<PathBuf>,
}

impl Form {
    fn into_input(self) -> Result<DocumentInput> {
        let attachment = self
            .file
            .as_deref()
            .map(AttachmentUpload::from_path)
            .transpose()?;

        Ok(DocumentInput {
            doc_number: self.number,
            source: self.source,
            subject: self.subject,
            doc_date: self.date,
            notes: self.notes,
            attachment,
        })
    }
}

fn init_logging(level: tracing::Level) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

fn print_document(document: &Document) {
    let file = document
        .attachment
        .as_ref()
        .map(|attachment| attachment.file_name.as_str())
        .unwrap_or("-");

    println!(
        "{}\t{}\t{}\t{}\t{}\t[{}]\t{}",
        document.id(),
        document.doc_number,
        document.doc_date,
        document.source,
        document.subject,
        document.tags.join(", "),
        file
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };

    init_logging(config.log);

    let store = StoreClient::new(&config)?;
    tracing::debug!(endpoint = %store.endpoint(), "document store");
    let tagger = config
        .tagging_api_key
        .clone()
        .map(|key| TaggingClient::new(&config, key))
        .transpose()?;
    let cache = SqliteCache::open(&config.cache_path()?)?;

    let repository =
        Repository::open(store, tagger, cache).with_tagging_required(config.tagging_required);
    let mut session = Session::new(repository, config.recent_limit);

    if !matches!(args.command, Command::Sync) {
        let notice = session.start().await;
        if notice.severity != Severity::Info {
            eprintln!("{notice}");
        }
    }

    let notice = match args.command {
        Command::List { query, sort, asc } => {
            session.set_query(query);
            if let Some(key) = sort {
                let state = session.toggle_sort(key);
                if asc && state.direction == Direction::Descending {
                    session.toggle_sort(key);
                }
            }

            let visible = session.visible();
            for document in &visible {
                print_document(document);
            }

            let order = match session.sort() {
                Some(state) => format!("{} {}", state.key, state.direction),
                None if session.query().trim().is_empty() => String::from("most recent"),
                None => String::from("stored order"),
            };
            eprintln!("{} documents for \"{}\", {order}", visible.len(), session.query());

            return Ok(ExitCode::SUCCESS);
        }

        Command::Add(form) => session.create(form.into_input()?).await,

        Command::Edit { id, form } => session.update(&id, form.into_input()?).await,

        Command::Delete { id } => session.delete(&id).await,

        Command::Sync => session.refresh().await,

        Command::Download { id, out } => {
            let download = session.download(&id)?;
            let path = out.unwrap_or_else(|| PathBuf::from(&download.file_name));
            std::fs::write(&path, &download.bytes)?;

            doc_registry::Notice::info(format!(
                "Wrote {} ({}, {} bytes)",
                path.display(),
                download.mime_type,
                download.bytes.len()
            ))
        }
    };

    println!("{notice}");

    Ok(if notice.severity == Severity::Info {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

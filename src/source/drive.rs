//! Google Drive folders through the Drive v3 REST API.
//!
//! Children of the folder are listed page by page. Google Docs and Slides are
//! exported as plain text and Sheets as CSV; uploaded PDF, Office and text
//! files are downloaded and run through [`extract_text`]. Sub-folders and
//! anything else are skipped.
//!
//! Credentials come from the environment: an OAuth access token (sent as a
//! bearer token) or, for folders shared publicly, an API key.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::DocumentSource;
use crate::config::DriveSourceConfig;
use crate::extract::{self, extract_text};
use crate::link::FolderId;
use crate::models::Document;

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const GOOGLE_APPS_PREFIX: &str = "application/vnd.google-apps.";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, modifiedTime, webViewLink, size)";
const PAGE_SIZE: &str = "100";

#[derive(Debug, Clone)]
enum Credentials {
    Bearer(String),
    ApiKey(String),
}

pub struct DriveSource {
    api_base: String,
    credentials: Option<Credentials>,
    credential_vars: (String, String),
    max_file_bytes: u64,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: String,
    modified_time: Option<DateTime<Utc>>,
    web_view_link: Option<String>,
    /// Drive reports sizes as decimal strings; absent for Google Workspace files.
    size: Option<String>,
}

/// How to turn a listed file into text.
#[derive(Debug, PartialEq)]
enum Fetch {
    /// Server-side export of a Google Workspace file to this MIME type.
    Export(&'static str),
    /// Download the raw bytes and extract locally.
    Download,
    Skip,
}

fn fetch_plan(mime_type: &str) -> Fetch {
    match mime_type {
        "application/vnd.google-apps.document" | "application/vnd.google-apps.presentation" => {
            Fetch::Export(extract::MIME_TEXT)
        }
        "application/vnd.google-apps.spreadsheet" => Fetch::Export("text/csv"),
        m if m.starts_with(GOOGLE_APPS_PREFIX) => Fetch::Skip,
        m if extract::is_supported(m) => Fetch::Download,
        _ => Fetch::Skip,
    }
}

fn folder_query(folder: &FolderId) -> String {
    format!("'{}' in parents and trashed = false", folder)
}

impl DriveSource {
    pub fn new(config: &DriveSourceConfig, timeout: Duration) -> Result<Self> {
        let credentials = read_env(&config.token_env)
            .map(Credentials::Bearer)
            .or_else(|| read_env(&config.api_key_env).map(Credentials::ApiKey));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            credentials,
            credential_vars: (config.token_env.clone(), config.api_key_env.clone()),
            max_file_bytes: config.max_file_bytes,
            client,
        })
    }

    fn get(&self, url: &str) -> Result<reqwest::RequestBuilder> {
        let req = self.client.get(url);
        match &self.credentials {
            Some(Credentials::Bearer(token)) => Ok(req.bearer_auth(token)),
            Some(Credentials::ApiKey(key)) => Ok(req.query(&[("key", key)])),
            None => bail!(
                "no Google Drive credentials: set {} or {}",
                self.credential_vars.0,
                self.credential_vars.1
            ),
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = req.send().await.with_context(|| format!("{} failed", what))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{}: Drive API error {}: {}", what, status, body.trim());
        }
        Ok(response)
    }

    async fn list_folder(&self, folder: &FolderId) -> Result<Vec<DriveFile>> {
        let url = format!("{}/files", self.api_base);
        let query = folder_query(folder);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", query.as_str()),
                ("fields", LIST_FIELDS),
                ("pageSize", PAGE_SIZE),
                ("orderBy", "name"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }
            let req = self.get(&url)?.query(&params);
            let page: FileList = self
                .send(req, &format!("listing folder {}", folder))
                .await?
                .json()
                .await
                .context("decoding Drive file list")?;
            files.extend(page.files);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(files)
    }

    async fn fetch_bytes(&self, file: &DriveFile, plan: &Fetch) -> Result<Vec<u8>> {
        let req = match plan {
            Fetch::Export(mime) => self
                .get(&format!("{}/files/{}/export", self.api_base, file.id))?
                .query(&[("mimeType", *mime)]),
            Fetch::Download => self
                .get(&format!("{}/files/{}", self.api_base, file.id))?
                .query(&[("alt", "media"), ("supportsAllDrives", "true")]),
            Fetch::Skip => bail!("{} is not fetchable", file.name),
        };
        let bytes = self
            .send(req, &format!("downloading {}", file.name))
            .await?
            .bytes()
            .await
            .with_context(|| format!("reading {}", file.name))?;
        if bytes.len() as u64 > self.max_file_bytes {
            bail!(
                "{} is {} bytes, over the {} byte limit",
                file.name,
                bytes.len(),
                self.max_file_bytes
            );
        }
        Ok(bytes.to_vec())
    }

    fn too_large(&self, file: &DriveFile) -> bool {
        file.size
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .is_some_and(|n| n > self.max_file_bytes)
    }
}

#[async_trait]
impl DocumentSource for DriveSource {
    fn name(&self) -> &str {
        "drive"
    }

    async fn load(&self, folder: &FolderId) -> Result<Vec<Document>> {
        let files = self.list_folder(folder).await?;
        tracing::debug!(folder = %folder, listed = files.len(), "listed Drive folder");

        let mut docs = Vec::new();
        for file in files {
            let plan = fetch_plan(&file.mime_type);
            if plan == Fetch::Skip {
                if file.mime_type != FOLDER_MIME {
                    tracing::debug!(file = %file.name, mime = %file.mime_type, "skipping unsupported file");
                }
                continue;
            }
            if self.too_large(&file) {
                tracing::warn!(file = %file.name, size = ?file.size, "skipping file over size limit");
                continue;
            }

            let bytes = self.fetch_bytes(&file, &plan).await?;
            let content_type = match plan {
                Fetch::Export(mime) => mime,
                _ => file.mime_type.as_str(),
            };
            let text = match extract_text(&bytes, content_type) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(file = %file.name, error = %e, "skipping file: extraction failed");
                    continue;
                }
            };
            if text.trim().is_empty() {
                continue;
            }
            docs.push(Document {
                name: file.name.clone(),
                uri: file.web_view_link.clone(),
                content_type: file.mime_type.clone(),
                updated_at: file.modified_time,
                text,
            });
        }

        if docs.is_empty() {
            bail!("folder {} contains no readable documents", folder);
        }
        docs.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::info!(folder = %folder, documents = docs.len(), "loaded Drive folder");
        Ok(docs)
    }
}

fn read_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

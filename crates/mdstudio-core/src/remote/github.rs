//! GitHub contents API backend
//!
//! Notes live as `*.md` files at the root of a private repository owned by
//! the token's user. File names start with the creation time in milliseconds,
//! so sorting paths in descending order lists the newest notes first.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::codec::{decode_text, encode_text};
use super::error::{RemoteError, RemoteResult};
use super::{PasteId, RemoteConnector, RemoteStore, SavedNote};
use crate::config::Config;
use crate::models::{slugify, title_from_heading, Note};

const ACCEPT: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = concat!("mdstudio/", env!("CARGO_PKG_VERSION"));
const NOTE_EXTENSION: &str = ".md";
const REPO_DESCRIPTION: &str = "Private notes synced automatically from Markdown Studio";
const SHARED_PASTE_FILE: &str = "shared-note.md.enc";

/// Validates tokens and provisions the notes repository
#[derive(Debug, Clone)]
pub struct GitHubConnector {
    http: Client,
    api_url: String,
    repo_name: String,
    provision_delay: Duration,
}

impl GitHubConnector {
    pub fn new(api_url: impl Into<String>, repo_name: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            repo_name: repo_name.into(),
            provision_delay: Duration::from_secs(2),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.api_url, &config.repo_name).with_provision_delay(config.provision_delay())
    }

    /// Wait applied after creating the repository, while GitHub finishes setting it up
    pub fn with_provision_delay(mut self, delay: Duration) -> Self {
        self.provision_delay = delay;
        self
    }

    fn get(&self, url: &str, token: &str) -> RequestBuilder {
        authorized(self.http.get(url), token)
    }

    async fn resolve_owner(&self, token: &str) -> RemoteResult<String> {
        let url = format!("{}/user", self.api_url);
        let resp = self.get(&url, token).send().await?;
        let user: User = read_json(check(resp, "resolve user").await?).await?;
        Ok(user.login)
    }

    async fn ensure_repository(&self, token: &str, owner: &str) -> RemoteResult<()> {
        let url = format!("{}/repos/{}/{}", self.api_url, owner, self.repo_name);
        let resp = self.get(&url, token).send().await?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => self.create_repository(token).await,
            StatusCode::UNAUTHORIZED => Err(RemoteError::Unauthorized),
            StatusCode::FORBIDDEN => Err(RemoteError::Forbidden("access repository".into())),
            s => Err(RemoteError::Provisioning(format!(
                "failed to access repository {}/{} ({})",
                owner, self.repo_name, s
            ))),
        }
    }

    async fn create_repository(&self, token: &str) -> RemoteResult<()> {
        info!("Creating private repository {}", self.repo_name);
        let url = format!("{}/user/repos", self.api_url);
        let body = CreateRepo {
            name: &self.repo_name,
            description: REPO_DESCRIPTION,
            private: true,
            auto_init: true,
        };
        let resp = authorized(self.http.post(&url), token)
            .json(&body)
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => {
                // Creation is asynchronous on GitHub's side
                tokio::time::sleep(self.provision_delay).await;
                Ok(())
            }
            StatusCode::UNAUTHORIZED => Err(RemoteError::Unauthorized),
            StatusCode::FORBIDDEN => Err(RemoteError::Forbidden("create repository".into())),
            s => Err(RemoteError::Provisioning(format!(
                "repository creation failed ({})",
                s
            ))),
        }
    }
}

#[async_trait]
impl RemoteConnector for GitHubConnector {
    type Session = GitHubSession;

    async fn connect(&self, credential: &str) -> RemoteResult<GitHubSession> {
        let token = credential.trim();
        if token.is_empty() {
            return Err(RemoteError::Unauthorized);
        }

        let owner = self.resolve_owner(token).await?;
        self.ensure_repository(token, &owner).await?;
        info!("Connected to GitHub as {} ({})", owner, self.repo_name);

        Ok(GitHubSession {
            http: self.http.clone(),
            api_url: self.api_url.clone(),
            token: token.to_string(),
            owner,
            repo: self.repo_name.clone(),
        })
    }
}

/// A configured connection to the notes repository
#[derive(Clone)]
pub struct GitHubSession {
    http: Client,
    api_url: String,
    token: String,
    owner: String,
    repo: String,
}

impl std::fmt::Debug for GitHubSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubSession")
            .field("api_url", &self.api_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

impl GitHubSession {
    /// Login of the account owning the repository
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn contents_url(&self, path: Option<&str>) -> String {
        let base = format!("{}/repos/{}/{}/contents", self.api_url, self.owner, self.repo);
        match path {
            Some(p) => format!("{}/{}", base, encode_path(p)),
            None => base,
        }
    }

    async fn fetch_note(&self, path: &str) -> RemoteResult<Note> {
        let file = self.fetch_file(path).await?;
        let content = decode_text(&file.content)?;
        let title = title_from_heading(&content).unwrap_or_else(|| file_stem(&file.path));
        Ok(Note {
            id: file.sha,
            path: Some(file.path),
            title,
            content,
        })
    }

    async fn fetch_file(&self, path: &str) -> RemoteResult<ContentFile> {
        let resp = authorized(self.http.get(self.contents_url(Some(path))), &self.token)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        read_json(check(resp, "fetch note").await?).await
    }

    /// Current version token of a blob
    async fn current_version(&self, path: &str) -> RemoteResult<String> {
        Ok(self.fetch_file(path).await?.sha)
    }

    /// One conditional write; a failed precondition comes back as `Conflict`
    async fn put_blob(
        &self,
        path: &str,
        title: &str,
        content: &str,
        version: Option<&str>,
    ) -> RemoteResult<SavedNote> {
        let body = PutContent {
            message: format!("Auto-saved note: {}", title),
            content: encode_text(content),
            sha: version,
        };
        let resp = authorized(self.http.put(self.contents_url(Some(path))), &self.token)
            .json(&body)
            .send()
            .await?;

        match resp.status() {
            // 422 is what GitHub answers when the sha is missing for an existing file
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => Err(RemoteError::Conflict {
                path: path.to_string(),
            }),
            _ => {
                let written: PutResponse = read_json(check(resp, "save note").await?).await?;
                Ok(SavedNote {
                    version: written.content.sha,
                    path: written.content.path,
                })
            }
        }
    }
}

#[async_trait]
impl RemoteStore for GitHubSession {
    async fn list_notes(&self) -> RemoteResult<Vec<Note>> {
        let resp = authorized(self.http.get(self.contents_url(None)), &self.token)
            .send()
            .await?;

        // An empty repository has no contents listing at all
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let entries: Vec<ContentEntry> = read_json(check(resp, "list notes").await?).await?;

        let files: Vec<&ContentEntry> = entries
            .iter()
            .filter(|e| e.kind == "file" && e.name.ends_with(NOTE_EXTENSION))
            .collect();
        let fetched = join_all(files.iter().map(|e| self.fetch_note(&e.path))).await;

        // A blob can vanish or be unreadable without spoiling the rest
        let mut notes = Vec::with_capacity(fetched.len());
        for (entry, result) in files.iter().zip(fetched) {
            match result {
                Ok(note) => notes.push(note),
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => warn!("Skipping {}: {}", entry.path, e),
            }
        }

        notes.sort_by(|a, b| b.path.cmp(&a.path));
        debug!("Listed {} notes", notes.len());
        Ok(notes)
    }

    async fn save_note(
        &self,
        version: Option<&str>,
        path: Option<&str>,
        title: &str,
        content: &str,
    ) -> RemoteResult<SavedNote> {
        let path = match path {
            Some(p) => p.to_string(),
            None => new_note_path(title, Utc::now()),
        };

        match self.put_blob(&path, title, content, version).await {
            Err(RemoteError::Conflict { .. }) => {
                warn!("Version conflict on {}, retrying with the current version", path);
                let current = self.current_version(&path).await.map_err(|e| {
                    if e.is_auth() {
                        e
                    } else {
                        RemoteError::WriteFailed {
                            path: path.clone(),
                            reason: format!("could not refetch version: {}", e),
                        }
                    }
                })?;
                self.put_blob(&path, title, content, Some(&current))
                    .await
                    .map_err(|e| match e {
                        RemoteError::Conflict { path } => RemoteError::WriteFailed {
                            path,
                            reason: "version changed again during retry".to_string(),
                        },
                        other => other,
                    })
            }
            result => result,
        }
    }

    async fn delete_note(&self, path: &str, version: &str) -> RemoteResult<()> {
        let body = DeleteContent {
            message: "Deleted via Markdown Studio",
            sha: version,
        };
        let resp = authorized(self.http.delete(self.contents_url(Some(path))), &self.token)
            .json(&body)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!("{} already absent remotely", path);
            return Ok(());
        }
        check(resp, "delete note").await?;
        Ok(())
    }

    async fn create_shared_paste(&self, content: &str) -> RemoteResult<PasteId> {
        let mut files = HashMap::new();
        files.insert(SHARED_PASTE_FILE.to_string(), GistFile { content });
        let body = CreateGist {
            description: "Shared from Markdown Studio",
            public: false,
            files,
        };
        let url = format!("{}/gists", self.api_url);
        let resp = authorized(self.http.post(&url), &self.token)
            .json(&body)
            .send()
            .await?;
        let gist: Gist = read_json(check(resp, "create paste").await?).await?;
        Ok(PasteId(gist.id))
    }
}

/// Path for a new note: creation millis plus a slug of the title
pub(crate) fn new_note_path(title: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}{}", now.timestamp_millis(), slugify(title), NOTE_EXTENSION)
}

fn file_stem(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.strip_suffix(NOTE_EXTENSION).unwrap_or(name).to_string()
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn authorized(builder: RequestBuilder, token: &str) -> RequestBuilder {
    builder
        .header("Authorization", format!("token {}", token))
        .header("Accept", ACCEPT)
        .header("User-Agent", USER_AGENT)
}

/// Map non-success statuses to errors
async fn check(resp: Response, context: &str) -> RemoteResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    debug!("GitHub '{}' returned {}", context, status);
    Err(match status {
        StatusCode::UNAUTHORIZED => RemoteError::Unauthorized,
        StatusCode::FORBIDDEN => RemoteError::Forbidden(context.to_string()),
        StatusCode::NOT_FOUND => RemoteError::NotFound(context.to_string()),
        s => RemoteError::Status {
            status: s.as_u16(),
            context: context.to_string(),
        },
    })
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> RemoteResult<T> {
    resp.json()
        .await
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

#[derive(Deserialize)]
struct User {
    login: String,
}

#[derive(Serialize)]
struct CreateRepo<'a> {
    name: &'a str,
    description: &'a str,
    private: bool,
    auto_init: bool,
}

#[derive(Deserialize)]
struct ContentEntry {
    name: String,
    path: String,
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Deserialize)]
struct ContentFile {
    path: String,
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct PutContent<'a> {
    message: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Deserialize)]
struct PutResponse {
    content: WrittenContent,
}

#[derive(Deserialize)]
struct WrittenContent {
    path: String,
    sha: String,
}

#[derive(Serialize)]
struct DeleteContent<'a> {
    message: &'a str,
    sha: &'a str,
}

#[derive(Serialize)]
struct CreateGist<'a> {
    description: &'a str,
    public: bool,
    files: HashMap<String, GistFile<'a>>,
}

#[derive(Serialize)]
struct GistFile<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct Gist {
    id: String,
}

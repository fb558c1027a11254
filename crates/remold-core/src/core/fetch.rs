//! Content fetcher: download by URL, verify against an expected digest, and
//! only then expose the bytes at their destination.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use remold_domain::{hash_file, Hash};
use tempfile::NamedTempFile;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::NetworkConfig;
use crate::error::Error;
use crate::fs::{ensure_clean, remove_path};
use crate::net::http_client;

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub destination: PathBuf,
    pub expected: Option<Hash>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            expected: None,
        }
    }

    #[must_use]
    pub fn verified(mut self, expected: Hash) -> Self {
        self.expected = Some(expected);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// Downloaded without an expected digest.
    Fetched,
    /// Digest recomputed and matched.
    Verified,
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub url: String,
    pub local_path: PathBuf,
    pub expected: Option<Hash>,
    pub state: ArtifactState,
    pub size: u64,
}

pub struct Fetcher {
    client: reqwest::Client,
    runtime: Runtime,
    jobs: Option<usize>,
}

impl Fetcher {
    pub fn new(network: &NetworkConfig) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to create download runtime")?;
        Ok(Self {
            client: http_client(network)?,
            runtime,
            jobs: Some(network.download_jobs),
        })
    }

    /// Change the batch fan-out; `None` launches every member at once.
    #[must_use]
    pub fn with_fan_out(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Download one object, replacing anything at its destination.
    pub fn fetch(&self, request: FetchRequest) -> Result<Artifact> {
        let destination = request.destination.clone();
        let result = self.runtime.block_on(fetch_one(&self.client, request));
        if result.is_err() {
            let _ = remove_path(&destination);
        }
        result
    }

    /// Download every request; any failure fails the batch and discards all
    /// of its destinations.
    pub fn fetch_all(&self, requests: Vec<FetchRequest>) -> Result<Vec<Artifact>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let destinations: Vec<PathBuf> = requests
            .iter()
            .map(|request| request.destination.clone())
            .collect();
        let result = self
            .runtime
            .block_on(fetch_batch(self.client.clone(), requests, self.jobs));
        if result.is_err() {
            for destination in &destinations {
                if let Err(err) = remove_path(destination) {
                    warn!(path = %destination.display(), %err, "failed to discard partial download");
                }
            }
        }
        result
    }

    /// Like [`Fetcher::fetch`], but keeps an existing destination whose
    /// digest already matches.
    pub fn ensure(&self, request: FetchRequest) -> Result<Artifact> {
        if let Some(artifact) = reuse_existing(&request)? {
            return Ok(artifact);
        }
        self.fetch(request)
    }

    /// Batch form of [`Fetcher::ensure`].
    pub fn ensure_all(&self, requests: Vec<FetchRequest>) -> Result<Vec<Artifact>> {
        let mut artifacts = Vec::with_capacity(requests.len());
        let mut pending = Vec::new();
        for request in requests {
            match reuse_existing(&request)? {
                Some(artifact) => artifacts.push(artifact),
                None => pending.push(request),
            }
        }
        debug!(
            reused = artifacts.len(),
            pending = pending.len(),
            "ensuring downloads"
        );
        artifacts.extend(self.fetch_all(pending)?);
        Ok(artifacts)
    }

    /// Fetch a small text document such as a `.sha256` sidecar.
    pub fn fetch_text(&self, url: &str) -> Result<String> {
        self.runtime.block_on(async {
            if let Some(path) = file_url_path(url)? {
                return std::fs::read_to_string(&path).map_err(|err| Error::network(url, err));
            }
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|err| Error::network(url, err))?;
            let status = response.status();
            if !status.is_success() {
                return Err(Error::network(url, format!("HTTP {status}")));
            }
            response.text().await.map_err(|err| Error::network(url, err))
        })
    }
}

fn reuse_existing(request: &FetchRequest) -> Result<Option<Artifact>> {
    let Some(expected) = &request.expected else {
        return Ok(None);
    };
    if !request.destination.is_file() {
        return Ok(None);
    }
    let actual = hash_file(expected.algorithm, &request.destination)?;
    if !expected.matches(&actual) {
        debug!(path = %request.destination.display(), "cached copy is stale");
        return Ok(None);
    }
    let size = request.destination.metadata().map(|meta| meta.len())?;
    Ok(Some(Artifact {
        url: request.url.clone(),
        local_path: request.destination.clone(),
        expected: request.expected.clone(),
        state: ArtifactState::Verified,
        size,
    }))
}

async fn fetch_batch(
    client: reqwest::Client,
    requests: Vec<FetchRequest>,
    jobs: Option<usize>,
) -> Result<Vec<Artifact>> {
    let total = requests.len();
    let semaphore = jobs.map(|jobs| Arc::new(Semaphore::new(jobs.max(1))));
    let mut set = JoinSet::new();
    for (index, request) in requests.into_iter().enumerate() {
        let client = client.clone();
        let semaphore = semaphore.clone();
        set.spawn(async move {
            let _permit = match semaphore {
                Some(semaphore) => Some(
                    semaphore
                        .acquire_owned()
                        .await
                        .context("download limiter closed")?,
                ),
                None => None,
            };
            fetch_one(&client, request).await.map(|artifact| (index, artifact))
        });
    }

    let mut slots: Vec<Option<Artifact>> = vec![None; total];
    let mut first_error: Option<anyhow::Error> = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok((index, artifact))) => slots[index] = Some(artifact),
            Ok(Err(err)) => {
                if first_error.is_none() {
                    first_error = Some(err);
                    set.abort_all();
                }
            }
            Err(err) if err.is_cancelled() => {}
            Err(err) => {
                if first_error.is_none() {
                    first_error = Some(anyhow!("download task panicked: {err}"));
                    set.abort_all();
                }
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }
    Ok(slots.into_iter().flatten().collect())
}

async fn fetch_one(client: &reqwest::Client, request: FetchRequest) -> Result<Artifact> {
    let FetchRequest {
        url,
        destination,
        expected,
    } = request;
    ensure_clean(&destination)?;
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    let mut hasher = expected.as_ref().map(|hash| hash.algorithm.hasher());
    let mut written: u64 = 0;

    if let Some(path) = file_url_path(&url)? {
        let mut file = File::open(&path).map_err(|err| Error::network(&url, err))?;
        let mut buffer = vec![0_u8; 64 * 1024];
        loop {
            let read = file
                .read(&mut buffer)
                .map_err(|err| Error::network(&url, err))?;
            if read == 0 {
                break;
            }
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(&buffer[..read]);
            }
            tmp.write_all(&buffer[..read])?;
            written += read as u64;
        }
    } else {
        let mut response = client
            .get(&url)
            .send()
            .await
            .map_err(|err| Error::network(&url, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::network(&url, format!("HTTP {status}")));
        }
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| Error::network(&url, err))?
        {
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(&chunk);
            }
            tmp.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
    }
    tmp.flush()?;

    let state = match (&expected, hasher) {
        (Some(expected), Some(hasher)) => {
            let actual = hasher.finish_hex();
            if !expected.matches(&actual) {
                return Err(Error::Integrity {
                    target: url,
                    expected: expected.digest.clone(),
                    actual,
                }
                .into());
            }
            ArtifactState::Verified
        }
        _ => ArtifactState::Fetched,
    };

    tmp.persist(&destination)
        .map_err(|err| anyhow!("unable to persist {}: {}", destination.display(), err.error))?;
    debug!(%url, bytes = written, path = %destination.display(), "fetched");
    Ok(Artifact {
        url,
        local_path: destination,
        expected,
        state,
        size: written,
    })
}

/// Local path for `file://` URLs, `None` for anything else.
fn file_url_path(raw: &str) -> Result<Option<PathBuf>> {
    if !raw.starts_with("file:") {
        return Ok(None);
    }
    let parsed = url::Url::parse(raw).map_err(|err| Error::network(raw, err))?;
    parsed
        .to_file_path()
        .map(Some)
        .map_err(|()| Error::network(raw, "not a local file URL"))
}

/// `file://` URL for a local path.
pub fn file_url(path: &Path) -> Result<String> {
    url::Url::from_file_path(path)
        .map(String::from)
        .map_err(|()| anyhow!("{} is not an absolute path", path.display()))
}

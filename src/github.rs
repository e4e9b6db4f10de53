use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

use crate::structures::{Error, Release, ReleaseAsset, ResponseStatus, SourceError};
use crate::traits::{AsString, ReleaseSource};

const API_ROOT: &str = "https://api.github.com";

/// Release source backed by the github releases api.
///
/// Release tags double as version channels: with a channel configured, the
/// newest release whose tag carries it is offered instead of the service's
/// own "latest".
pub struct GithubSource {
  owner: String,
  repo: String,
  channel: Option<String>,
  client: reqwest::Client,
}

impl GithubSource {
  pub fn new(application_name: &str, owner: &str, repo: &str, channel: Option<String>) -> Result<GithubSource, Error> {
    let client = reqwest::Client::builder()
      .user_agent(application_name.to_string())
      .build()
      .map_err(Error::NetworkUnavailable)?;
    Ok(GithubSource {
      owner: owner.to_string(),
      repo: repo.to_string(),
      channel,
      client,
    })
  }

  fn releases_url(&self) -> Result<Url, Error> {
    let path = match self.channel {
      Some(_) => format!("{}/repos/{}/{}/releases", API_ROOT, self.owner, self.repo),
      None => format!("{}/repos/{}/{}/releases/latest", API_ROOT, self.owner, self.repo),
    };
    Ok(Url::parse(&path)?)
  }

  async fn fetch_json(&self, url: Url) -> Result<json::JsonValue, Error> {
    debug!("requesting {}", url);
    let response = self.client.get(url).send().await.map_err(Error::NetworkUnavailable)?;
    let status = response.status().as_u16();
    let body = response.text().await.map_err(Error::NetworkUnavailable)?;
    if body.is_empty() {
      return Err(Error::NoResponse());
    }
    let parsed = json::parse(&body)?;
    match ResponseStatus::from_code(status) {
      ResponseStatus::Success => Ok(parsed),
      classification => {
        warn!("release source answered {} ({:?})", status, classification);
        Err(Error::UnsuccessfulResponse(SourceError {
          message: parsed["message"].as_string_option().unwrap_or_else(|| format!("status {}", status)),
          documentation_url: parsed["documentation_url"].as_string_option().unwrap_or_default(),
        }))
      }
    }
  }

  fn release_from_json(value: &json::JsonValue) -> Option<Release> {
    let tag = value["tag_name"].as_string_option()?;
    let id = value["id"].as_u64()?;
    let assets = value["assets"]
      .members()
      .filter_map(|asset| {
        Some(ReleaseAsset {
          name: asset["name"].as_string_option()?,
          size: asset["size"].as_u64().unwrap_or(0),
          download_url: asset["browser_download_url"].as_string_option()?,
        })
      })
      .collect();
    Some(Release { id, tag, assets })
  }
}

#[async_trait]
impl ReleaseSource for GithubSource {
  async fn latest_release(&self) -> Result<Release, Error> {
    let body = self.fetch_json(self.releases_url()?).await?;
    let release = match &self.channel {
      Some(channel) => body
        .members()
        .find(|release| {
          release["tag_name"].as_string_option().map(|tag| tag.contains(channel.as_str())).unwrap_or(false)
        })
        .and_then(Self::release_from_json),
      None => Self::release_from_json(&body),
    };
    match release {
      Some(release) => Ok(release),
      None => Err(Error::NoResponse()),
    }
  }

  async fn fetch_text(&self, url: &str) -> Result<String, Error> {
    let url = Url::parse(url)?;
    let response = self.client.get(url).send().await.map_err(Error::NetworkUnavailable)?;
    if !response.status().is_success() {
      return Err(Error::UnsuccessfulResponse(SourceError {
        message: format!("status {}", response.status().as_u16()),
        documentation_url: String::new(),
      }));
    }
    Ok(response.text().await.map_err(Error::NetworkUnavailable)?)
  }

  async fn fetch_file(&self, url: &str, dest: &Path, on_chunk: &mut (dyn FnMut(u64, Option<u64>) + Send)) -> Result<(), Error> {
    let url = Url::parse(url)?;
    let response = self.client.get(url).send().await.map_err(Error::NetworkUnavailable)?;
    if !response.status().is_success() {
      return Err(Error::UnsuccessfulResponse(SourceError {
        message: format!("status {}", response.status().as_u16()),
        documentation_url: String::new(),
      }));
    }
    let content_length = response.content_length();
    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut received: u64 = 0;
    while let Some(chunk) = stream.next().await {
      let chunk = chunk.map_err(Error::NetworkUnavailable)?;
      file.write_all(&chunk).await?;
      received += chunk.len() as u64;
      on_chunk(received, content_length);
    }
    file.flush().await?;
    Ok(())
  }
}

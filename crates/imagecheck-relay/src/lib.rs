// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use imagecheck_app::ImageStatus;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

pub const DEFAULT_RELAY_BASE: &str = "https://corsproxy.io/?";

/// Shown in place of an image the relay could not deliver.
pub const PLACEHOLDER_TEXT: &str = "Image Blocked by CSP";

pub const PLACEHOLDER_SVG: &str = concat!(
    r#"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="200">"#,
    r##"<rect fill="#ddd" width="200" height="200"/>"##,
    r##"<text x="50%" y="50%" dominant-baseline="middle" text-anchor="middle" fill="#999" font-size="10">Image Blocked</text>"##,
    r##"<text x="50%" y="55%" dominant-baseline="middle" text-anchor="middle" fill="#999" font-size="8">by CSP</text>"##,
    "</svg>",
);

/// Characters left as-is in a URI component: ASCII alphanumerics and
/// `- _ . ! ~ * ' ( )`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encodes `value` as a single URI component, the way
/// `encodeURIComponent` does.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

pub fn relay_url(base_url: &str, image_url: &str) -> String {
    format!("{base_url}{}", encode_component(image_url))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub status: u16,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim();
        if base_url.is_empty() {
            bail!("relay.base_url must not be empty");
        }
        url::Url::parse(base_url)
            .with_context(|| format!("relay.base_url {base_url:?} is not an absolute URL"))?;

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url: base_url.to_owned(),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn relay_url(&self, image_url: &str) -> String {
        relay_url(&self.base_url, image_url)
    }

    /// Requests `image_url` through the relay and checks that an image came
    /// back.
    pub fn fetch(&self, image_url: &str) -> Result<FetchedImage> {
        let target = self.relay_url(image_url);
        let response = self
            .http
            .get(&target)
            .send()
            .map_err(|error| connection_error(&self.base_url, self.timeout(), error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_owned();
        if !content_type.starts_with("image/") {
            let shown = if content_type.is_empty() {
                "no content type"
            } else {
                content_type.as_str()
            };
            bail!("relay returned {shown}, not an image");
        }

        Ok(FetchedImage {
            status: status.as_u16(),
            content_type,
        })
    }

    /// Like [`Client::fetch`] but folds every failure into the returned status
    /// so one bad image never affects another.
    pub fn probe(&self, image_url: &str) -> ImageStatus {
        if image_url.trim().is_empty() {
            return ImageStatus::Missing;
        }

        match self.fetch(image_url) {
            Ok(image) => {
                tracing::debug!(image_url, content_type = %image.content_type, "image available");
                ImageStatus::Available {
                    content_type: image.content_type,
                }
            }
            Err(error) => {
                tracing::warn!(image_url, %error, "image failed to load");
                ImageStatus::Broken {
                    reason: error.to_string(),
                }
            }
        }
    }

    pub fn probe_all<'a, I>(&self, image_urls: I) -> Vec<(String, ImageStatus)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        image_urls
            .into_iter()
            .map(|image_url| (image_url.to_owned(), self.probe(image_url)))
            .collect()
    }
}

fn connection_error(base_url: &str, timeout: Duration, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!(
            "relay {base_url} timed out after {timeout:?} -- raise [relay].timeout or try again"
        );
    }
    anyhow!(
        "cannot reach relay {} -- check [relay].base_url ({})",
        base_url,
        error
    )
}

fn status_error(status: StatusCode) -> anyhow::Error {
    match status.canonical_reason() {
        Some(reason) => anyhow!("relay returned {} {}", status.as_u16(), reason),
        None => anyhow!("relay returned {}", status.as_u16()),
    }
}

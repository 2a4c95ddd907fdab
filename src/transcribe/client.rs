//! Multipart upload of a recording to a speech-to-text HTTP endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

/// Upper bound for a single transcription request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client for a transcription endpoint that accepts a multipart `file`
/// upload and answers with plain text.
pub struct TranscriptionClient {
    http: reqwest::Client,
    url: String,
    language: Option<String>,
}

impl TranscriptionClient {
    /// Create a client for `url`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: &str, language: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().context("Failed to create HTTP client")?;
        info!("Transcription endpoint: {}", url);
        Ok(Self { http, url: url.to_string(), language })
    }

    /// Build the multipart form for one recording.
    fn form(&self, wav: Vec<u8>) -> Result<Form> {
        let part = Part::bytes(wav).file_name("recording.wav").mime_str("audio/wav").context("Invalid audio MIME type")?;
        let mut form = Form::new().part("file", part);
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }
        Ok(form)
    }

    /// Upload a WAV recording and return the transcription text.
    ///
    /// # Errors
    /// Returns an error if the request fails or the endpoint answers with a
    /// non-success status. There is no retry.
    pub async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        debug!("Uploading {} bytes for transcription", wav.len());

        let response = self.http.post(&self.url).multipart(self.form(wav)?).send().await.context("Transcription request failed")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read transcription response")?;
        check_status(status, &body)?;

        Ok(body.trim().to_string())
    }
}

/// Turn a non-success response into a user-facing error string.
fn check_status(status: StatusCode, body: &str) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    let detail = body.trim();
    if detail.is_empty() {
        anyhow::bail!("Transcription failed: {}", status);
    }
    anyhow::bail!("Transcription failed: {}: {}", status, detail)
}

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::info;

/// Failure talking to the media host. Rendered to API clients as a
/// generic internal error; detail stays in the logs.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("media host request failed")]
    Http(#[from] reqwest::Error),
    #[error("media host rejected the upload with status {status}")]
    Rejected { status: reqwest::StatusCode },
}

/// Hosted blob reference returned by the media host.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedMedia {
    pub url: String,
}

/// Client for the external media host: store a blob, get back a URL.
#[derive(Clone)]
pub struct MediaClient {
    base_url: String,
    client: reqwest::Client,
}

impl MediaClient {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    /// Upload image bytes and return the hosted URL.
    pub async fn upload(
        &self,
        data: Vec<u8>,
        filename: &str,
    ) -> Result<UploadedMedia, MediaError> {
        let mime_type = sniff_image_mime(&data);

        info!(
            "uploading {} ({}, {} bytes) to media host",
            filename,
            mime_type,
            data.len()
        );

        let part = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(mime_type)?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MediaError::Rejected {
                status: response.status(),
            });
        }

        let uploaded = response.json::<UploadedMedia>().await?;

        info!("media host stored blob at {}", uploaded.url);

        Ok(uploaded)
    }
}

/// Detect the image format from magic bytes, defaulting to PNG for
/// anything unknown or unsupported.
fn sniff_image_mime(data: &[u8]) -> &'static str {
    match infer::get(data) {
        Some(kind) => {
            let mime = kind.mime_type();
            if mime == "image/png" || mime == "image/jpeg" {
                mime
            } else {
                info!("unsupported image format: {}, defaulting to PNG", mime);
                "image/png"
            }
        }
        None => {
            info!("could not detect image format, defaulting to PNG");
            "image/png"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_png_and_jpeg_magic_bytes() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];

        assert_eq!(sniff_image_mime(&png), "image/png");
        assert_eq!(sniff_image_mime(&jpeg), "image/jpeg");
    }

    #[test]
    fn unknown_bytes_default_to_png() {
        assert_eq!(sniff_image_mime(b"plain text, not an image"), "image/png");
        assert_eq!(sniff_image_mime(&[]), "image/png");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = MediaClient::new("https://media.example/", reqwest::Client::new());
        assert_eq!(client.base_url, "https://media.example");
    }
}

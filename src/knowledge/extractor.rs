// src/knowledge/extractor.rs — Document-to-text extraction clients
//
// Two hops share one trait: the client talks to the gateway's
// `/api/process-document`, and the gateway talks to the external document
// service. Both normalize the response body the same way.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::Path;

use super::normalize::normalize_extraction_response;
use crate::infra::config::DocumentsConfig;
use crate::infra::errors::AvatarError;
use crate::util::log_preview;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Doc,
}

impl DocumentKind {
    /// Value of the multipart `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Doc => "doc",
        }
    }

    /// Anything other than `pdf` is routed as a Word document.
    pub fn from_form_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("pdf") {
            DocumentKind::Pdf
        } else {
            DocumentKind::Doc
        }
    }

    /// File picker filter: `.pdf` for PDFs, `.doc`/`.docx` for Word.
    pub fn accepts_extension(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        match self {
            DocumentKind::Pdf => extension == "pdf",
            DocumentKind::Doc => extension == "doc" || extension == "docx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Doc => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

/// A file chosen for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".into());
        Ok(Self { name, bytes })
    }

    fn part(&self, kind: DocumentKind) -> Result<Part, AvatarError> {
        Part::bytes(self.bytes.clone())
            .file_name(self.name.clone())
            .mime_str(kind.mime_type())
            .map_err(|e| AvatarError::Extraction(e.to_string()))
    }
}

#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Return the text content of `file`. The result is not yet
    /// whitespace-normalized.
    async fn extract(
        &self,
        file: &UploadedFile,
        kind: DocumentKind,
        auth_token: &str,
    ) -> Result<String, AvatarError>;
}

/// Client side: uploads to the gateway's `POST /api/process-document`.
pub struct GatewayExtractor {
    client: reqwest::Client,
    endpoint: String,
}

impl GatewayExtractor {
    pub fn new(gateway_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/process-document", gateway_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl DocumentExtractor for GatewayExtractor {
    async fn extract(
        &self,
        file: &UploadedFile,
        kind: DocumentKind,
        auth_token: &str,
    ) -> Result<String, AvatarError> {
        let form = Form::new()
            .part("file", file.part(kind)?)
            .text("type", kind.as_str());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(auth_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AvatarError::Extraction(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AvatarError::Http {
                status: status.as_u16(),
                message: format!(
                    "Failed to extract {} content: {}",
                    kind.as_str().to_uppercase(),
                    status.as_u16()
                ),
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AvatarError::Extraction(format!("invalid response body: {e}")))?;
        normalize_extraction_response(&body)
    }
}

/// Gateway side: forwards to the external document service, picking the
/// endpoint and multipart field name by document kind.
pub struct ServiceExtractor {
    client: reqwest::Client,
    config: DocumentsConfig,
}

impl ServiceExtractor {
    pub fn new(config: DocumentsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn endpoint(&self, kind: DocumentKind) -> &str {
        match kind {
            DocumentKind::Pdf => &self.config.pdf_endpoint,
            DocumentKind::Doc => &self.config.docx_endpoint,
        }
    }

    pub fn field_name(kind: DocumentKind) -> &'static str {
        match kind {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Doc => "file",
        }
    }
}

#[async_trait]
impl DocumentExtractor for ServiceExtractor {
    async fn extract(
        &self,
        file: &UploadedFile,
        kind: DocumentKind,
        auth_token: &str,
    ) -> Result<String, AvatarError> {
        let form = Form::new().part(Self::field_name(kind), file.part(kind)?);
        let endpoint = self.endpoint(kind);

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(auth_token)
            .multipart(form)
            .timeout(std::time::Duration::from_secs(self.config.timeout_seconds))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AvatarError::Timeout {
                        operation: "document service".into(),
                        seconds: self.config.timeout_seconds,
                    }
                } else {
                    AvatarError::Extraction(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                "Document service returned HTTP {}: {}",
                status.as_u16(),
                log_preview(&body)
            );
            return Err(AvatarError::Http {
                status: status.as_u16(),
                message: "File processing failed".into(),
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AvatarError::Extraction(format!("invalid response body: {e}")))?;
        normalize_extraction_response(&body).map_err(|_| {
            AvatarError::Extraction("Unexpected response format from external API".into())
        })
    }
}

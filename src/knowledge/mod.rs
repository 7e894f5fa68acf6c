// src/knowledge/mod.rs — Knowledge Source Resolver
//
// Turns one of four input modes (URL, pasted text, PDF, Word document) into
// the knowledge text a session starts with. Only one source is selected at a
// time; switching kinds or re-uploading bumps an epoch so a late extraction
// result can never land on the wrong selection.

pub mod extractor;
pub mod normalize;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::auth::TokenSource;
use crate::infra::errors::AvatarError;
use crate::session::SessionConfig;

pub use extractor::{DocumentExtractor, DocumentKind, UploadedFile};
use normalize::normalize_knowledge_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeKind {
    Url,
    Text,
    Pdf,
    Doc,
}

impl KnowledgeKind {
    pub fn document_kind(&self) -> Option<DocumentKind> {
        match self {
            KnowledgeKind::Pdf => Some(DocumentKind::Pdf),
            KnowledgeKind::Doc => Some(DocumentKind::Doc),
            KnowledgeKind::Url | KnowledgeKind::Text => None,
        }
    }
}

impl fmt::Display for KnowledgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KnowledgeKind::Url => "url",
            KnowledgeKind::Text => "text",
            KnowledgeKind::Pdf => "pdf",
            KnowledgeKind::Doc => "doc",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStatus {
    Pending,
    Success(String),
    Failed(String),
}

impl ExtractionStatus {
    /// Per-file status label.
    pub fn label(&self) -> &'static str {
        match self {
            ExtractionStatus::Pending => "Processing...",
            ExtractionStatus::Success(_) => "Processed",
            ExtractionStatus::Failed(_) => "Failed to process",
        }
    }
}

/// State of a PDF/DOC selection: empty until a file is chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentUpload {
    pub file_name: Option<String>,
    pub status: Option<ExtractionStatus>,
}

impl DocumentUpload {
    fn text(&self) -> &str {
        match &self.status {
            Some(ExtractionStatus::Success(text)) => text,
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KnowledgeSource {
    Url(String),
    Text(String),
    Pdf(DocumentUpload),
    Doc(DocumentUpload),
}

impl KnowledgeSource {
    pub fn empty(kind: KnowledgeKind) -> Self {
        match kind {
            KnowledgeKind::Url => KnowledgeSource::Url(String::new()),
            KnowledgeKind::Text => KnowledgeSource::Text(String::new()),
            KnowledgeKind::Pdf => KnowledgeSource::Pdf(DocumentUpload::default()),
            KnowledgeKind::Doc => KnowledgeSource::Doc(DocumentUpload::default()),
        }
    }

    pub fn kind(&self) -> KnowledgeKind {
        match self {
            KnowledgeSource::Url(_) => KnowledgeKind::Url,
            KnowledgeSource::Text(_) => KnowledgeKind::Text,
            KnowledgeSource::Pdf(_) => KnowledgeKind::Pdf,
            KnowledgeSource::Doc(_) => KnowledgeKind::Doc,
        }
    }

    /// Raw (un-normalized) text this source currently resolves to. A document
    /// resolves to nothing until its extraction has succeeded.
    pub fn resolved_text(&self) -> &str {
        match self {
            KnowledgeSource::Url(value) | KnowledgeSource::Text(value) => value,
            KnowledgeSource::Pdf(upload) | KnowledgeSource::Doc(upload) => upload.text(),
        }
    }

    fn upload_mut(&mut self) -> Option<&mut DocumentUpload> {
        match self {
            KnowledgeSource::Pdf(upload) | KnowledgeSource::Doc(upload) => Some(upload),
            KnowledgeSource::Url(_) | KnowledgeSource::Text(_) => None,
        }
    }
}

/// What happened to an upload once its extraction settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Applied(ExtractionStatus),
    /// The selection changed while the request was in flight; the result was
    /// thrown away.
    Superseded,
}

#[derive(Default)]
struct ResolverState {
    source: Option<KnowledgeSource>,
    epoch: u64,
}

pub struct KnowledgeResolver {
    extractor: Arc<dyn DocumentExtractor>,
    tokens: Arc<dyn TokenSource>,
    timeout: Duration,
    state: Mutex<ResolverState>,
}

impl KnowledgeResolver {
    pub fn new(
        extractor: Arc<dyn DocumentExtractor>,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            tokens,
            timeout,
            state: Mutex::new(ResolverState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Select a source kind. Picking a different kind discards the previous
    /// payload and any extraction still in flight.
    pub fn select(&self, kind: KnowledgeKind) {
        let mut state = self.lock();
        if state.source.as_ref().map(KnowledgeSource::kind) == Some(kind) {
            return;
        }
        state.epoch += 1;
        state.source = Some(KnowledgeSource::empty(kind));
        tracing::debug!("Knowledge source: {}", kind);
    }

    /// Update the live value of a URL/Text source. Returns `false` when the
    /// current selection does not take typed input.
    pub fn set_input(&self, value: &str) -> bool {
        let mut state = self.lock();
        match state.source.as_mut() {
            Some(KnowledgeSource::Url(current)) | Some(KnowledgeSource::Text(current)) => {
                *current = value.to_string();
                true
            }
            _ => false,
        }
    }

    /// Extract `file` for the selected PDF/DOC source.
    ///
    /// Marks the source `Pending`, issues one extraction request, then applies
    /// `Success` (normalized text) or `Failed` unless the selection moved on.
    pub async fn upload(&self, file: UploadedFile) -> Result<UploadOutcome, AvatarError> {
        let (epoch, kind) = {
            let mut state = self.lock();
            let kind = state
                .source
                .as_ref()
                .and_then(|s| s.kind().document_kind())
                .ok_or_else(|| {
                    AvatarError::Extraction("select a PDF or document source first".into())
                })?;
            state.epoch += 1;
            let epoch = state.epoch;
            if let Some(upload) = state.source.as_mut().and_then(KnowledgeSource::upload_mut) {
                *upload = DocumentUpload {
                    file_name: Some(file.name.clone()),
                    status: Some(ExtractionStatus::Pending),
                };
            }
            (epoch, kind)
        };
        tracing::info!("Extracting {} ({} bytes)", file.name, file.bytes.len());

        let status = match self.run_extraction(&file, kind).await {
            Ok(text) => ExtractionStatus::Success(normalize_knowledge_text(&text)),
            Err(e) => {
                tracing::warn!("Error processing {}: {}", file.name, e);
                ExtractionStatus::Failed(failure_reason(e))
            }
        };

        let mut state = self.lock();
        if state.epoch != epoch {
            tracing::debug!("Discarding superseded extraction of {}", file.name);
            return Ok(UploadOutcome::Superseded);
        }
        if let Some(upload) = state.source.as_mut().and_then(KnowledgeSource::upload_mut) {
            upload.status = Some(status.clone());
        }
        Ok(UploadOutcome::Applied(status))
    }

    async fn run_extraction(
        &self,
        file: &UploadedFile,
        kind: DocumentKind,
    ) -> Result<String, AvatarError> {
        let token = self.tokens.auth_token().ok_or(AvatarError::MissingAuthToken)?;
        match tokio::time::timeout(self.timeout, self.extractor.extract(file, kind, &token)).await
        {
            Ok(result) => result,
            Err(_) => Err(AvatarError::Timeout {
                operation: "document extraction".into(),
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    pub fn source(&self) -> Option<KnowledgeSource> {
        self.lock().source.clone()
    }

    pub fn kind(&self) -> Option<KnowledgeKind> {
        self.lock().source.as_ref().map(KnowledgeSource::kind)
    }

    /// Raw knowledge text of the current selection.
    pub fn resolved_text(&self) -> String {
        self.lock()
            .source
            .as_ref()
            .map(|s| s.resolved_text().to_string())
            .unwrap_or_default()
    }

    /// Whether the start control should be enabled.
    pub fn can_start(&self) -> bool {
        !normalize_knowledge_text(&self.resolved_text()).is_empty()
    }

    /// Build the session config from the current selection.
    pub fn session_config(&self) -> Result<SessionConfig, AvatarError> {
        let state = self.lock();
        let text = match state.source.as_ref() {
            None => return Err(AvatarError::EmptyKnowledge),
            Some(KnowledgeSource::Url(url)) => url.as_str(),
            Some(KnowledgeSource::Text(text)) => text.as_str(),
            Some(KnowledgeSource::Pdf(upload)) | Some(KnowledgeSource::Doc(upload)) => {
                upload.text()
            }
        };
        SessionConfig::new(text)
    }

    /// One-line status for the selected file, e.g. `notes.pdf: Processed (812 characters)`.
    pub fn upload_status_line(&self) -> Option<String> {
        let state = self.lock();
        let upload = match state.source.as_ref()? {
            KnowledgeSource::Pdf(upload) | KnowledgeSource::Doc(upload) => upload,
            _ => return None,
        };
        let name = upload.file_name.as_deref()?;
        let status = upload.status.as_ref()?;
        Some(match status {
            ExtractionStatus::Success(text) => format!(
                "{name}: {} ({} characters)",
                status.label(),
                text.chars().count()
            ),
            _ => format!("{name}: {}", status.label()),
        })
    }
}

/// Per-file failure reason shown next to an upload.
fn failure_reason(error: AvatarError) -> String {
    match error {
        AvatarError::Extraction(reason) => reason,
        other => other.to_string(),
    }
}

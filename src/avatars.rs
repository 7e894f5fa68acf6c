// src/avatars.rs — Avatar catalog: listing, de-duplication, client-side paging

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::infra::errors::AvatarError;
use crate::util::log_preview;

pub const PAGE_SIZE: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarSummary {
    pub avatar_id: String,
    #[serde(default)]
    pub avatar_name: String,
    #[serde(default)]
    pub preview_image_url: Option<String>,
    #[serde(default)]
    pub preview_video_url: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvatarListData {
    #[serde(default)]
    pub avatars: Vec<AvatarSummary>,
}

/// `{ "data": { "avatars": [...] } }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvatarListResponse {
    #[serde(default)]
    pub data: AvatarListData,
}

/// The full de-duplicated list, revealed one page of six at a time.
#[derive(Debug, Clone, Default)]
pub struct AvatarCatalog {
    avatars: Vec<AvatarSummary>,
}

impl AvatarCatalog {
    /// Keep the first occurrence of each `avatar_id`, preserving order.
    pub fn new(avatars: Vec<AvatarSummary>) -> Self {
        let mut seen = HashSet::new();
        let avatars = avatars
            .into_iter()
            .filter(|a| seen.insert(a.avatar_id.clone()))
            .collect();
        Self { avatars }
    }

    pub fn len(&self) -> usize {
        self.avatars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.avatars.is_empty()
    }

    pub fn page_count(&self) -> usize {
        self.avatars.len().div_ceil(PAGE_SIZE)
    }

    /// Avatars on page `page` (1-based). Out-of-range pages are empty.
    pub fn page(&self, page: usize) -> &[AvatarSummary] {
        if page == 0 {
            return &[];
        }
        let start = (page - 1).saturating_mul(PAGE_SIZE);
        if start >= self.avatars.len() {
            return &[];
        }
        let end = (start + PAGE_SIZE).min(self.avatars.len());
        &self.avatars[start..end]
    }

    /// Everything revealed after loading `pages` pages.
    pub fn revealed(&self, pages: usize) -> &[AvatarSummary] {
        let end = pages.saturating_mul(PAGE_SIZE).min(self.avatars.len());
        &self.avatars[..end]
    }

    pub fn has_more(&self, pages_loaded: usize) -> bool {
        pages_loaded.saturating_mul(PAGE_SIZE) < self.avatars.len()
    }

    pub fn find(&self, avatar_id: &str) -> Option<&AvatarSummary> {
        self.avatars.iter().find(|a| a.avatar_id == avatar_id)
    }
}

/// Fetch the catalog from the gateway's `GET /api/avatars`.
pub async fn fetch_catalog(gateway_url: &str) -> Result<AvatarCatalog, AvatarError> {
    let url = format!("{}/api/avatars", gateway_url.trim_end_matches('/'));
    let response = reqwest::get(&url).await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AvatarError::Http {
            status: status.as_u16(),
            message: format!("Failed to fetch avatars: {}", log_preview(&body)),
        });
    }
    let body: AvatarListResponse = response.json().await?;
    Ok(AvatarCatalog::new(body.data.avatars))
}

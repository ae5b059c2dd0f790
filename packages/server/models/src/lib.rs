#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the tender watch server.
//!
//! Response envelopes use `camelCase` keys; tender records keep their
//! Portuguese field names.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tender_watch_tender_models::{Category, DocumentKind, Provenance, TenderRecord};

/// Default page number.
pub const DEFAULT_PAGE: usize = 1;

/// Default page size.
pub const DEFAULT_LIMIT: usize = 10;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable message.
    pub error: String,
}

impl ApiError {
    /// Wraps `message` in an error body.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Provenance of the data a response was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDataSource {
    /// Origin of the served snapshot.
    pub provenance: Option<Provenance>,
    /// Whether the served snapshot is a persisted fallback.
    pub is_using_persisted_data: bool,
    /// When the served data was produced.
    pub last_update: Option<DateTime<Utc>>,
    /// Consecutive failed refresh attempts.
    pub retry_attempts: u32,
}

/// One page of a filtered listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    /// Matches before pagination.
    pub total: usize,
    /// One-based page number.
    pub page: usize,
    /// Number of pages at the requested page size.
    pub total_pages: usize,
    /// Records on this page.
    pub results: Vec<T>,
    /// Where the data came from.
    pub data_source: ApiDataSource,
}

/// `GET /api/status` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatus {
    /// `operational` once a snapshot is served, `initializing` before.
    pub status: String,
    /// Lifecycle phase of the refresh orchestrator.
    pub phase: String,
    /// Where the data came from.
    pub data_source: ApiDataSource,
    /// Records per category in the served snapshot.
    pub statistics: BTreeMap<Category, usize>,
}

/// JSON export of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    /// Every record of the category.
    pub data: Vec<TenderRecord>,
    /// Where the data came from.
    pub data_source: ApiDataSource,
}

/// Query parameters for `GET /api/concursos/abertos`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenTenderParams {
    /// Province, case-insensitive equality.
    pub provincia: Option<String>,
    /// Procedure type, case-insensitive equality.
    pub tipo_concurso: Option<String>,
    /// Issuing entity, case-insensitive substring.
    pub entidade: Option<String>,
    /// Free text matched against every field.
    pub search: Option<String>,
    /// One-based page number.
    pub page: Option<usize>,
    /// Page size.
    pub limit: Option<usize>,
}

/// Query parameters for `GET /api/concursos/adjudicados`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AwardedParams {
    /// Free text matched against every field.
    pub search: Option<String>,
    /// One-based page number.
    pub page: Option<usize>,
    /// Page size.
    pub limit: Option<usize>,
}

/// Query parameters for `GET /api/concursos/ajustes-directos`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectAdjustmentParams {
    /// Issuing entity, case-insensitive substring.
    pub entidade: Option<String>,
    /// Contracted party, case-insensitive substring.
    pub contratada: Option<String>,
    /// Inclusive lower bound on the contract value.
    pub valor_min: Option<f64>,
    /// Inclusive upper bound on the contract value.
    pub valor_max: Option<f64>,
    /// Free text matched against every field.
    pub search: Option<String>,
    /// One-based page number.
    pub page: Option<usize>,
    /// Page size.
    pub limit: Option<usize>,
}

/// Query parameters for `GET /api/concursos/export`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportParams {
    /// Category slug: `abertos`, `adjudicados` or `ajustes-directos`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// `json` (default) or `csv`.
    pub format: Option<String>,
}

/// Query parameters for `GET /api/concursos/{type}/detalhes`.
#[derive(Debug, Clone, Deserialize)]
pub struct DetailParams {
    /// Tender reference.
    pub referencia: String,
}

/// Query parameters for `GET /api/proxy-pdf`.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentParams {
    /// Tender reference.
    pub referencia: String,
    /// Which document to fetch.
    #[serde(rename = "type", default)]
    pub kind: DocumentKind,
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tender record, snapshot, and provenance types.
//!
//! Every listing scraped from the procurement portal is normalized into a
//! [`TenderRecord`]. A full refresh produces an immutable [`Snapshot`] that
//! groups the records by [`Category`]. The serialized form of a snapshot is
//! the blob kept by the persistent store, so the field names follow the
//! portal's Portuguese vocabulary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Version tag written into every snapshot's metadata.
pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// A listing category published by the portal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum Category {
    /// Tenders currently open for bids.
    #[serde(rename = "concursos_abertos")]
    #[strum(serialize = "concursos_abertos")]
    OpenTenders,
    /// Tenders that have been awarded.
    #[serde(rename = "concursos_adjudicados")]
    #[strum(serialize = "concursos_adjudicados")]
    AwardedTenders,
    /// Direct adjustments (contracts awarded without a public tender).
    #[serde(rename = "ajustes_diretos")]
    #[strum(serialize = "ajustes_diretos")]
    DirectAdjustments,
}

impl Category {
    /// Every category, in the order they are fetched.
    pub const ALL: [Self; 3] = [
        Self::OpenTenders,
        Self::AwardedTenders,
        Self::DirectAdjustments,
    ];

    /// Path of the listing page for this category, relative to the portal
    /// base URL.
    #[must_use]
    pub const fn listing_path(self) -> &'static str {
        match self {
            Self::OpenTenders => "/query/Busca_concurso1.php",
            Self::AwardedTenders => "/query/Busca_adjudicacao.php",
            Self::DirectAdjustments => "/query/Busca_ajustes_directos.php",
        }
    }

    /// Path of the detail page for this category, relative to the portal
    /// base URL. The record reference is passed as the `referencia` query
    /// parameter.
    #[must_use]
    pub const fn detail_path(self) -> &'static str {
        match self {
            Self::OpenTenders => "/concurso_detalhes.php",
            Self::AwardedTenders => "/adjudicacao_detalhes.php",
            Self::DirectAdjustments => "/ajustes_directos_detalhes.php",
        }
    }

    /// Short slug used in REST routes (e.g. `/api/concursos/abertos`).
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::OpenTenders => "abertos",
            Self::AwardedTenders => "adjudicados",
            Self::DirectAdjustments => "ajustes-directos",
        }
    }

    /// Resolves a REST route slug back to its category.
    #[must_use]
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.slug() == slug)
    }
}

/// A value scraped from a numeric column.
///
/// Values that parse cleanly are stored as numbers; anything else keeps its
/// cleaned raw text so one malformed cell never aborts a whole page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A whole number (e.g. a lot count).
    Integer(i64),
    /// A decimal number (e.g. a contract value).
    Number(f64),
    /// Text that could not be parsed as a number.
    Text(String),
}

impl FieldValue {
    /// Strips everything except digits, `.` and `-`, then parses the result
    /// as a decimal number. Falls back to the cleaned text.
    #[must_use]
    pub fn parse_decimal(raw: &str) -> Self {
        let cleaned = clean_numeric(raw);
        cleaned
            .parse::<f64>()
            .map_or(Self::Text(cleaned), Self::Number)
    }

    /// Parses `raw` as a whole number, falling back to the trimmed text.
    #[must_use]
    pub fn parse_integer(raw: &str) -> Self {
        let trimmed = raw.trim();
        trimmed
            .parse::<i64>()
            .map_or_else(|_| Self::Text(trimmed.to_owned()), Self::Integer)
    }

    /// Returns the numeric value, if there is one.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Keeps only the characters that can appear in a plain decimal literal.
#[must_use]
pub fn clean_numeric(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect()
}

/// A single tender listing.
///
/// Which optional fields are populated depends on the [`Category`] the
/// record was scraped from. Uniqueness is by (category, reference) within a
/// snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TenderRecord {
    /// Procedure type (e.g. "Concurso Público").
    #[serde(
        rename = "tipo_concurso",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tender_type: Option<String>,
    /// Portal reference of the tender.
    #[serde(rename = "referencia", default)]
    pub reference: String,
    /// Subject of the tender.
    #[serde(rename = "objeto", default)]
    pub subject: String,
    /// Issuing entity (UGEA).
    #[serde(rename = "ugea", default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Province the tender belongs to.
    #[serde(rename = "provincia", default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    /// Launch date as published.
    #[serde(
        rename = "data_lancamento",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub launched_on: Option<String>,
    /// Bid opening date as published.
    #[serde(
        rename = "data_abertura",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub opening_date: Option<String>,
    /// Bid opening time as published.
    #[serde(
        rename = "hora_abertura",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub opening_time: Option<String>,
    /// Award date (awarded tenders only).
    #[serde(
        rename = "data_adjudicacao",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub awarded_on: Option<String>,
    /// Contracted party (direct adjustments only).
    #[serde(
        rename = "contratada",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub contractor: Option<String>,
    /// Contract value (direct adjustments only).
    #[serde(rename = "valor", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
    /// Contract date (direct adjustments only).
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub dated: Option<String>,
    /// Link to the portal's detail page.
    #[serde(
        rename = "link_detalhes",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub detail_link: Option<String>,
}

impl TenderRecord {
    /// Creates a record with only a reference and subject set.
    #[must_use]
    pub fn new(reference: &str, subject: &str) -> Self {
        Self {
            reference: reference.to_owned(),
            subject: subject.to_owned(),
            ..Self::default()
        }
    }

    /// Returns every populated field rendered as text, in declaration order.
    ///
    /// Used for free-text search across a record.
    #[must_use]
    pub fn field_texts(&self) -> Vec<String> {
        let mut texts = vec![self.reference.clone(), self.subject.clone()];
        let optional = [
            &self.tender_type,
            &self.entity,
            &self.province,
            &self.launched_on,
            &self.opening_date,
            &self.opening_time,
            &self.awarded_on,
            &self.contractor,
            &self.dated,
            &self.detail_link,
        ];
        texts.extend(optional.into_iter().flatten().cloned());
        if let Some(value) = &self.value {
            texts.push(value.to_string());
        }
        texts
    }
}

/// Snapshot metadata: when it was generated and how many records each
/// category holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// When the snapshot was produced by a live fetch.
    #[serde(rename = "ultima_atualizacao")]
    pub generated_at: DateTime<Utc>,
    /// Blob format version.
    #[serde(rename = "versao", default = "default_version")]
    pub version: String,
    /// Number of records per category.
    #[serde(rename = "estatisticas", default)]
    pub counts: BTreeMap<Category, usize>,
}

fn default_version() -> String {
    SNAPSHOT_VERSION.to_owned()
}

/// A complete, immutable point-in-time capture of every category's records.
///
/// A refresh always builds a new `Snapshot`; existing snapshots are shared
/// behind an `Arc` and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    meta: SnapshotMeta,
    #[serde(rename = "dados")]
    data: BTreeMap<Category, Vec<TenderRecord>>,
}

impl Snapshot {
    /// Builds a snapshot, deriving the per-category counts from `data`.
    #[must_use]
    pub fn new(data: BTreeMap<Category, Vec<TenderRecord>>, generated_at: DateTime<Utc>) -> Self {
        let counts = data.iter().map(|(c, r)| (*c, r.len())).collect();
        Self {
            meta: SnapshotMeta {
                generated_at,
                version: SNAPSHOT_VERSION.to_owned(),
                counts,
            },
            data,
        }
    }

    /// Snapshot metadata.
    #[must_use]
    pub const fn meta(&self) -> &SnapshotMeta {
        &self.meta
    }

    /// When the snapshot was generated.
    #[must_use]
    pub const fn generated_at(&self) -> DateTime<Utc> {
        self.meta.generated_at
    }

    /// Records of one category, empty if the category is absent.
    #[must_use]
    pub fn records(&self, category: Category) -> &[TenderRecord] {
        self.data.get(&category).map_or(&[], Vec::as_slice)
    }

    /// All categories and their records.
    #[must_use]
    pub const fn data(&self) -> &BTreeMap<Category, Vec<TenderRecord>> {
        &self.data
    }

    /// Total number of records across all categories.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }

    /// Whether the snapshot holds no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_records() == 0
    }
}

/// Where the currently served snapshot came from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Provenance {
    /// Produced by the most recent successful upstream fetch.
    Live,
    /// Loaded from the persistent store as a fallback.
    Persisted,
}

/// Which downloadable document of a tender to fetch.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentKind {
    /// Tender terms and references.
    #[default]
    Document,
    /// Official tender announcement.
    Announcement,
}

impl DocumentKind {
    /// Path of the download endpoint, relative to the portal base URL.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Document => "/includes/Baixar_cad_enc.php",
            Self::Announcement => "/includes/Baixar_anuncio.php",
        }
    }

    /// File name offered to clients downloading the document.
    #[must_use]
    pub fn file_name(self, reference: &str) -> String {
        match self {
            Self::Document => format!("documento-{reference}.pdf"),
            Self::Announcement => format!("anuncio-{reference}.pdf"),
        }
    }
}

/// Key/value fields and document links from a tender's detail page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TenderDetails {
    /// Every key/value row of the detail table.
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
    /// Absolute link to the announcement file.
    #[serde(
        rename = "Ficheiro do Anuncio",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub announcement_link: Option<String>,
    /// Absolute link to the tender document.
    #[serde(
        rename = "Documento do Concurso",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub document_link: Option<String>,
}

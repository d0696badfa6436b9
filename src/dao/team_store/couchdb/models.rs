use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::models::{MetricEntity, PlayerLibraryEntity, TeamDocumentEntity, TeamRecordEntity};

pub const RECORD_PREFIX: &str = "record::";
pub const SHEET_PREFIX: &str = "sheet::";
pub const METRIC_PREFIX: &str = "metric::";
pub const LIBRARY_DOC_ID: &str = "library::players";
pub const SETTING_PREFIX: &str = "setting::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Roster-index record wrapped for CouchDB persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchRecordDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub record: TeamRecordEntity,
}

impl CouchRecordDocument {
    pub fn from_entity(record: TeamRecordEntity) -> Self {
        Self {
            id: record_doc_id(&record.team_id),
            rev: None,
            record,
        }
    }
}

/// Team payload wrapped for CouchDB persistence, keyed by sheet name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchSheetDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub document: TeamDocumentEntity,
}

impl CouchSheetDocument {
    pub fn from_entity(sheet_name: &str, document: TeamDocumentEntity) -> Self {
        Self {
            id: sheet_doc_id(sheet_name),
            rev: None,
            document,
        }
    }
}

/// Player library wrapped for CouchDB persistence (single well-known doc).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchLibraryDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub library: PlayerLibraryEntity,
}

impl CouchLibraryDocument {
    pub fn from_entity(library: PlayerLibraryEntity) -> Self {
        Self {
            id: LIBRARY_DOC_ID.to_string(),
            rev: None,
            library,
        }
    }
}

/// Diagnostics row wrapped for CouchDB persistence.
///
/// Doc IDs embed the RFC 3339 timestamp so `_all_docs` range reads come back
/// in chronological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchMetricDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub metric: MetricEntity,
}

impl CouchMetricDocument {
    pub fn from_entity(metric: MetricEntity, unique: uuid::Uuid) -> Self {
        Self {
            id: format!("{}{}::{}", METRIC_PREFIX, metric.timestamp, unique),
            rev: None,
            metric,
        }
    }
}

/// Opaque named setting wrapped for CouchDB persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchSettingDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub value: String,
}

impl CouchSettingDocument {
    pub fn from_parts(name: &str, value: String) -> Self {
        Self {
            id: setting_doc_id(name),
            rev: None,
            value,
        }
    }
}

pub fn record_doc_id(team_id: &str) -> String {
    format!("{}{}", RECORD_PREFIX, team_id)
}

pub fn sheet_doc_id(sheet_name: &str) -> String {
    format!("{}{}", SHEET_PREFIX, sheet_name)
}

pub fn setting_doc_id(name: &str) -> String {
    format!("{}{}", SETTING_PREFIX, name)
}

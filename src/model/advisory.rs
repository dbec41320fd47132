use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An advisory blob as found in a commit tree, before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisoryFile {
    /// Path relative to the repository root, `/`-separated.
    pub path: String,
    pub blob_hash: String,
    pub contents: Vec<u8>,
}

impl AdvisoryFile {
    pub fn new(path: impl Into<String>, blob_hash: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            blob_hash: blob_hash.into(),
            contents,
        }
    }

    /// The advisory id, taken from the file name (`2021/0xxx/CVE-2021-0001.json`
    /// has id `CVE-2021-0001`).
    pub fn id(&self) -> String {
        Path::new(&self.path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.clone())
    }

    /// Returns true if `path` names a CVE advisory file.
    pub fn is_advisory_path(path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        name.starts_with("CVE-") && name.ends_with(".json")
    }
}

/// A parsed advisory, immutable for the duration of one update attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Advisory {
    pub id: String,
    pub path: String,
    pub blob_hash: String,
    pub cve: Cve,
}

impl Advisory {
    pub fn parse(file: &AdvisoryFile) -> Result<Self, serde_json::Error> {
        let cve: Cve = serde_json::from_slice(&file.contents)?;
        Ok(Self {
            id: file.id(),
            path: file.path.clone(),
            blob_hash: file.blob_hash.clone(),
            cve,
        })
    }

    pub fn is_public(&self) -> bool {
        self.cve.metadata.state.eq_ignore_ascii_case("PUBLIC")
    }

    pub fn reference_urls(&self) -> impl Iterator<Item = &str> {
        self.cve
            .references
            .data
            .iter()
            .filter_map(|r| r.url.as_deref())
    }
}

/// The subset of the CVE JSON 4.0 format that triage looks at.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cve {
    #[serde(rename = "CVE_data_meta", default)]
    pub metadata: CveMetadata,
    #[serde(default)]
    pub references: CveReferences,
    #[serde(default)]
    pub description: CveDescription,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CveMetadata {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "STATE", default)]
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CveReferences {
    #[serde(rename = "reference_data", default)]
    pub data: Vec<CveReference>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CveReference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CveDescription {
    #[serde(rename = "description_data", default)]
    pub data: Vec<CveLangString>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CveLangString {
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub value: String,
}

/// The stored outcome of triaging one advisory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryRecord {
    pub id: String,
    pub path: String,
    pub blob_hash: String,
    /// Commit at which this advisory content was last triaged.
    pub commit_hash: String,
    pub relevant: bool,
    pub triaged_at: DateTime<Utc>,
}

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Opaque record id (UUID v4 text). Absent on records written by the oldest revision.
pub type Id = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    Open,
    Claimed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Lost,
    Found,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {field} '{value}' (expected {expected})")]
pub struct ParseEnumError {
    pub field: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Open => "Open",
            ItemStatus::Claimed => "Claimed",
        }
    }
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Lost => "Lost",
            ItemType::Found => "Found",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(ItemStatus::Open),
            "claimed" => Ok(ItemStatus::Claimed),
            _ => Err(ParseEnumError { field: "status", value: s.to_string(), expected: "Open or Claimed" }),
        }
    }
}

impl FromStr for ItemType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lost" => Ok(ItemType::Lost),
            "found" => Ok(ItemType::Found),
            _ => Err(ParseEnumError { field: "type", value: s.to_string(), expected: "Lost or Found" }),
        }
    }
}

/// One lost-or-found report as stored in the data file.
///
/// Every field except `name`, `status`, `poster` and `password` may be missing
/// in files written by older revisions and falls back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ItemType>,
    pub status: ItemStatus,
    pub poster: String,
    #[serde(default)]
    pub contact: String,
    pub password: String, // plaintext, compared verbatim
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
}

impl Item {
    /// Recorded image path; an empty string counts as no image.
    pub fn image(&self) -> Option<&str> {
        self.image_path.as_deref().filter(|p| !p.is_empty())
    }
}

/// Candidate record accepted by `Registry::add`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewItem {
    pub name: String,
    pub description: String,
    pub kind: Option<ItemType>,
    pub poster: String,
    pub contact: String,
    pub password: String,
    pub image_path: Option<String>,
}

/// Serializable projection of an `Item` that never carries the password.
#[derive(Debug, Serialize)]
pub struct PublicItem<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a str>,
    pub name: &'a str,
    pub description: &'a str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ItemType>,
    pub status: ItemStatus,
    pub poster: &'a str,
    pub contact: &'a str,
    pub image_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
}

impl<'a> From<&'a Item> for PublicItem<'a> {
    fn from(item: &'a Item) -> Self {
        Self {
            id: item.id.as_deref(),
            name: &item.name,
            description: &item.description,
            kind: item.kind,
            status: item.status,
            poster: &item.poster,
            contact: &item.contact,
            image_path: item.image_path.as_deref(),
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

/// Independent filter dimensions, combined with AND. `search` matches name,
/// description or poster (OR), case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub status: Option<ItemStatus>,
    pub kind: Option<ItemType>,
    pub search: Option<String>,
}

impl ItemFilter {
    pub fn matches(&self, item: &Item) -> bool {
        if let Some(status) = self.status {
            if item.status != status { return false; }
        }
        if let Some(kind) = self.kind {
            if item.kind != Some(kind) { return false; }
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                item.name.to_lowercase().contains(&term)
                    || item.description.to_lowercase().contains(&term)
                    || item.poster.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total: usize,
    pub open: usize,
    pub claimed: usize,
    pub lost: usize,
    pub found: usize,
    pub with_images: usize,
}

use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// A page within one language edition.
///
/// The title is stored in its URL-safe form (spaces replaced by underscores),
/// which is the form every request builder expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArticleRef {
    pub title: CompactString,
    pub language: CompactString,
}

impl ArticleRef {
    pub fn new(title: &str, language: &str) -> Self {
        Self {
            title: url_safe_title(title),
            language: CompactString::from(language.trim()),
        }
    }

    /// The title with underscores turned back into spaces, as shown on the wiki.
    pub fn display_title(&self) -> String {
        self.title.replace('_', " ")
    }
}

impl Display for ArticleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.language, self.title)
    }
}

pub(crate) fn url_safe_title(title: &str) -> CompactString {
    let title = title.trim();
    if title.contains(' ') {
        CompactString::from(title.replace(' ', "_"))
    } else {
        CompactString::from(title)
    }
}

/// One revision in canonical shape.
///
/// Sources deliver revisions newest first, but nothing downstream may rely on
/// that; sort before computing deltas.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision {
    pub timestamp: DateTime<Utc>,
    pub size: u64,
    // aka. user
    pub editor: CompactString,
    pub reverted: bool,
    pub is_reversion: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionAction {
    Protect,
    Modify,
    Unprotect,
    MoveProt,
    Other(String),
}

impl ProtectionAction {
    pub fn from_log_action(action: &str) -> Self {
        match action {
            "protect" => ProtectionAction::Protect,
            "modify" => ProtectionAction::Modify,
            "unprotect" => ProtectionAction::Unprotect,
            "move_prot" => ProtectionAction::MoveProt,
            other => ProtectionAction::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProtectionAction::Protect => "protect",
            ProtectionAction::Modify => "modify",
            ProtectionAction::Unprotect => "unprotect",
            ProtectionAction::MoveProt => "move_prot",
            ProtectionAction::Other(other) => other,
        }
    }
}

/// Where the expiry of a [`ProtectionEvent`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryOrigin {
    /// Machine-readable `params.details[].expiry`.
    Structured,
    /// Human-readable description or comment text.
    FreeText,
    /// Text was present but no grammar accepted it.
    Unparsable,
    /// Nothing to parse (e.g. unprotection).
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionEvent {
    pub article: ArticleRef,
    pub action: ProtectionAction,
    pub actor: Option<CompactString>,
    pub timestamp: DateTime<Utc>,
    pub level: Vec<String>,
    #[serde(rename = "type")]
    pub protection_type: Vec<String>,
    /// Indefinite protections carry [`crate::protection::indefinite_expiry`].
    pub expiry: Option<DateTime<Utc>>,
    pub expiry_origin: ExpiryOrigin,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditorProfile {
    pub editor: CompactString,
    pub language: CompactString,
    pub total_edit_count: u64,
}

/// A normalized revision joined with the contribution counts of its editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRow {
    pub article: CompactString,
    pub language: CompactString,
    pub editor: CompactString,
    pub timestamp: DateTime<Utc>,
    pub size: u64,
    pub reverted: bool,
    pub is_reversion: bool,
    /// Edits by this editor across the whole language edition.
    pub total_edits: u64,
    /// Edits by this editor within the joined revision set.
    pub article_edits: u64,
}

/// Number of revisions of one article in one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyCount {
    pub article: CompactString,
    pub language: CompactString,
    pub month: String,
    pub count: usize,
}

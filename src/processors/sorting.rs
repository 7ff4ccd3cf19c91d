//! Sample ordering by category priority and sequence number.
//!
//! Sample identifiers follow `<4 digits><CATEGORY_TOKEN>[_<suffix>]`, for
//! example `1023HEL_TOP`. Rows are ordered by the position of the token in
//! the configured priority list, then by the numeric sequence. Identifiers
//! that do not follow the grammar are kept and sorted after every sample,
//! preserving their relative order.

use regex::Regex;
use thiserror::Error;

/// Errors that can occur while building a sample order.
#[derive(Debug, Error)]
pub enum SortingError {
    #[error("category priority list is empty")]
    EmptyPriority,

    #[error("invalid category token '{0}'")]
    InvalidToken(String),

    #[error("failed to build identifier pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Parsed sample identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleId<'a> {
    /// Leading sequence number
    pub sequence: u32,
    /// Index of the token in the priority list
    pub category: usize,
    /// The matched token, e.g. `HEL_TOP`
    pub token: &'a str,
}

/// `(category_priority_index, sequence_number)`; derives a total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    pub priority: usize,
    pub sequence: u32,
}

/// Identifier grammar plus priority list.
#[derive(Debug, Clone)]
pub struct SampleOrder {
    pattern: Regex,
    priority: Vec<String>,
}

impl SampleOrder {
    /// Build the order for a priority list such as `["HEL_TOP", "BICYCLE"]`.
    ///
    /// Tokens must be non-empty and made of uppercase ASCII letters, digits
    /// and underscores.
    pub fn new(priority: &[String]) -> Result<Self, SortingError> {
        if priority.is_empty() {
            return Err(SortingError::EmptyPriority);
        }
        for token in priority {
            let valid = !token.is_empty()
                && token
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
            if !valid {
                return Err(SortingError::InvalidToken(token.clone()));
            }
        }

        // Alternation is leftmost-first, so list order also settles overlaps.
        let alternatives: Vec<String> = priority.iter().map(|t| regex::escape(t)).collect();
        let pattern = Regex::new(&format!(r"^(\d{{4}})({})", alternatives.join("|")))?;

        Ok(Self {
            pattern,
            priority: priority.to_vec(),
        })
    }

    /// Parse an identifier, `None` if it does not follow the grammar.
    pub fn parse<'a>(&self, identifier: &'a str) -> Option<SampleId<'a>> {
        let captures = self.pattern.captures(identifier.trim())?;
        let sequence = captures.get(1)?.as_str().parse().ok()?;
        let token = captures.get(2)?.as_str();
        let category = self.priority.iter().position(|t| t == token)?;
        Some(SampleId {
            sequence,
            category,
            token,
        })
    }

    /// Sort key of an identifier; unmatched identifiers sort last.
    pub fn sort_key(&self, identifier: &str) -> SortKey {
        match self.parse(identifier) {
            Some(id) => SortKey {
                priority: id.category,
                sequence: id.sequence,
            },
            None => SortKey {
                priority: self.priority.len(),
                sequence: 0,
            },
        }
    }

    /// Stable sort of rows by the key of the field at `id_col`.
    pub fn sort_rows(&self, rows: &mut [Vec<String>], id_col: usize) {
        rows.sort_by_cached_key(|row| {
            self.sort_key(row.get(id_col).map(String::as_str).unwrap_or(""))
        });
    }

    /// Number of rows whose identifier follows the grammar.
    pub fn count_matching(&self, rows: &[Vec<String>], id_col: usize) -> usize {
        rows.iter()
            .filter(|row| {
                row.get(id_col)
                    .map(|id| self.parse(id).is_some())
                    .unwrap_or(false)
            })
            .count()
    }
}

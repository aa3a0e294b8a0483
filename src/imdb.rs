//! Parsing for the tab-separated IMDb dataset exports.
//!
//! Both files lead with a `tconst` such as `tt0114709`. The external id stored on a
//! movie is that value with its two-character prefix removed. Missing values are
//! written as the literal `\N` and are turned into `None` here, so nothing past this
//! module ever compares against the sentinel.

use std::str::FromStr;

use thiserror::Error;

pub const NULL_SENTINEL: &str = "\\N";

const RATING_AVG_COLUMN: usize = 1;
const RATING_VOTES_COLUMN: usize = 2;
const METADATA_ADULT_COLUMN: usize = 4;
const METADATA_RUNTIME_COLUMN: usize = 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing column {index} in row {row:?}")]
    MissingField { index: usize, row: String },
    #[error("invalid external identifier {0:?}")]
    BadIdentifier(String),
    #[error("invalid {field} value {value:?}")]
    BadNumber { field: &'static str, value: String },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MergeKind {
    Ratings,
    Metadata,
}

impl MergeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeKind::Ratings => "ratings",
            MergeKind::Metadata => "metadata",
        }
    }

    /// Turns a matched row into the update it carries.
    pub fn parse_update(self, imdb_id: i64, line: &str) -> Result<MergeUpdate, ParseError> {
        let fields: Vec<&str> = line.split('\t').collect();
        match self {
            MergeKind::Ratings => Ok(MergeUpdate::Ratings {
                imdb_id,
                avg_rating: parse_nullable(&fields, line, RATING_AVG_COLUMN, "averageRating")?,
                num_votes: parse_nullable(&fields, line, RATING_VOTES_COLUMN, "numVotes")?,
            }),
            MergeKind::Metadata => {
                let is_adult: Option<i32> =
                    parse_nullable(&fields, line, METADATA_ADULT_COLUMN, "isAdult")?;
                Ok(MergeUpdate::Metadata {
                    imdb_id,
                    is_adult: is_adult.map(|v| v != 0),
                    runtime_min: parse_nullable(
                        &fields,
                        line,
                        METADATA_RUNTIME_COLUMN,
                        "runtimeMinutes",
                    )?,
                })
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MergeUpdate {
    Ratings { imdb_id: i64, avg_rating: Option<f64>, num_votes: Option<i64> },
    Metadata { imdb_id: i64, is_adult: Option<bool>, runtime_min: Option<i32> },
}

impl MergeUpdate {
    pub fn imdb_id(&self) -> i64 {
        match self {
            MergeUpdate::Ratings { imdb_id, .. } | MergeUpdate::Metadata { imdb_id, .. } => {
                *imdb_id
            },
        }
    }

    /// A row whose fields are all absent writes nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            MergeUpdate::Ratings { avg_rating, num_votes, .. } => {
                avg_rating.is_none() && num_votes.is_none()
            },
            MergeUpdate::Metadata { is_adult, runtime_min, .. } => {
                is_adult.is_none() && runtime_min.is_none()
            },
        }
    }
}

/// Extracts the numeric external id from the leading field of a TSV row.
pub fn parse_imdb_id(line: &str) -> Result<i64, ParseError> {
    let tconst = line.split('\t').next().unwrap_or_default();
    tconst
        .get(2..)
        .and_then(|digits| digits.trim().parse().ok())
        .ok_or_else(|| ParseError::BadIdentifier(tconst.to_string()))
}

fn parse_nullable<T: FromStr>(
    fields: &[&str],
    line: &str,
    index: usize,
    field: &'static str,
) -> Result<Option<T>, ParseError> {
    let raw = fields
        .get(index)
        .ok_or_else(|| ParseError::MissingField { index, row: line.to_string() })?
        .trim();
    if raw == NULL_SENTINEL {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| ParseError::BadNumber { field, value: raw.to_string() })
}

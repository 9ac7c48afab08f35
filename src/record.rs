//! Row types for the trending dataset.
//!
//! [`VideoRecord`] is what the fetcher produces and what lands in the flat
//! file, one column per field in declaration order. [`VideoRow`] is the typed
//! row the preprocessor works on: fields whose textual form still needs
//! parsing are modelled as tagged variants ([`Tags`], [`PublishedAt`]) so a
//! second preprocessing pass can tell parsed values apart from raw text
//! without inspecting them again.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::storage::RawTable;

/// Placeholder used when a video has no description.
pub const NO_DESCRIPTION: &str = "No description";
/// Category label used whenever a category id cannot be resolved.
pub const UNKNOWN_CATEGORY: &str = "Unknown";
/// Caption flag used when the platform omits it.
pub const DEFAULT_CAPTION: &str = "false";

/// Persisted column names, in file order.
pub const COLUMNS: [&str; 18] = [
    "video_id",
    "title",
    "description",
    "published_at",
    "channel_id",
    "channel_title",
    "category_id",
    "category_name",
    "tags",
    "duration",
    "definition",
    "caption",
    "view_count",
    "like_count",
    "dislike_count",
    "favorite_count",
    "comment_count",
    "country",
];

/// One trending video in one region, flattened from the API payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub published_at: String,
    pub channel_id: String,
    pub channel_title: String,
    pub category_id: Option<i64>,
    pub category_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub duration: String,
    pub definition: String,
    pub caption: String,
    pub view_count: u64,
    pub like_count: u64,
    pub dislike_count: u64,
    pub favorite_count: u64,
    pub comment_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Tag list that is either still in its serialized form or already a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tags {
    Raw(String),
    Parsed(Vec<String>),
}

impl Tags {
    /// Returns the materialized list, if parsing already happened.
    pub fn as_parsed(&self) -> Option<&[String]> {
        match self {
            Tags::Parsed(tags) => Some(tags),
            Tags::Raw(_) => None,
        }
    }

    /// Parses the serialized form. Already-parsed tags pass through untouched.
    pub fn materialize(self) -> std::result::Result<Vec<String>, serde_json::Error> {
        match self {
            Tags::Parsed(tags) => Ok(tags),
            Tags::Raw(text) => decode_tags(&text),
        }
    }
}

/// Serializes a tag list into the form stored in the `tags` column.
pub fn encode_tags(tags: &[String]) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string(tags)
}

/// Inverse of [`encode_tags`]. An empty cell is an empty list.
pub fn decode_tags(text: &str) -> std::result::Result<Vec<String>, serde_json::Error> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed)
}

/// Publish timestamp, raw or parsed. The platform returns RFC 3339 in UTC and
/// the parsed value keeps whatever offset the text carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishedAt {
    Raw(String),
    Parsed(DateTime<FixedOffset>),
}

impl PublishedAt {
    pub fn as_parsed(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            PublishedAt::Parsed(ts) => Some(ts),
            PublishedAt::Raw(_) => None,
        }
    }

    pub fn resolve(self) -> std::result::Result<DateTime<FixedOffset>, chrono::ParseError> {
        match self {
            PublishedAt::Parsed(ts) => Ok(ts),
            PublishedAt::Raw(text) => DateTime::parse_from_rfc3339(text.trim()),
        }
    }
}

/// Fixed duration buckets, half-open `[low, high)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DurationRange {
    UpTo5Min,
    From5To10Min,
    From10To20Min,
    From20To60Min,
    From60To120Min,
}

impl DurationRange {
    pub const ALL: [DurationRange; 5] = [
        DurationRange::UpTo5Min,
        DurationRange::From5To10Min,
        DurationRange::From10To20Min,
        DurationRange::From20To60Min,
        DurationRange::From60To120Min,
    ];

    /// Buckets a length in seconds; anything negative or at least two hours
    /// stays unbucketed.
    pub fn from_seconds(seconds: i64) -> Option<Self> {
        match seconds {
            0..300 => Some(DurationRange::UpTo5Min),
            300..600 => Some(DurationRange::From5To10Min),
            600..1200 => Some(DurationRange::From10To20Min),
            1200..3600 => Some(DurationRange::From20To60Min),
            3600..7200 => Some(DurationRange::From60To120Min),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DurationRange::UpTo5Min => "0-5 min",
            DurationRange::From5To10Min => "5-10 min",
            DurationRange::From10To20Min => "10-20 min",
            DurationRange::From20To60Min => "20-60 min",
            DurationRange::From60To120Min => "60-120 min",
        }
    }
}

impl fmt::Display for DurationRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Typed row consumed and produced by the preprocessor. Derived columns stay
/// `None` until the matching derivation runs (or when it cannot be computed
/// for this row).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRow {
    pub video_id: String,
    pub title: String,
    pub description: Option<String>,
    pub published_at: PublishedAt,
    pub channel_id: String,
    pub channel_title: String,
    pub category_id: Option<i64>,
    pub category_name: String,
    pub tags: Tags,
    pub duration: String,
    pub definition: String,
    pub caption: String,
    pub view_count: u64,
    pub like_count: u64,
    pub dislike_count: u64,
    pub favorite_count: u64,
    pub comment_count: u64,
    pub country: Option<String>,
    pub duration_seconds: Option<i64>,
    pub duration_range: Option<DurationRange>,
    pub tag_count: Option<usize>,
    pub publish_hour: Option<u32>,
}

impl From<VideoRecord> for VideoRow {
    fn from(record: VideoRecord) -> Self {
        Self {
            video_id: record.video_id,
            title: record.title,
            description: Some(record.description).filter(|text| !text.is_empty()),
            published_at: PublishedAt::Raw(record.published_at),
            channel_id: record.channel_id,
            channel_title: record.channel_title,
            category_id: record.category_id,
            category_name: record.category_name,
            tags: Tags::Parsed(record.tags),
            duration: record.duration,
            definition: record.definition,
            caption: record.caption,
            view_count: record.view_count,
            like_count: record.like_count,
            dislike_count: record.dislike_count,
            favorite_count: record.favorite_count,
            comment_count: record.comment_count,
            country: record.country,
            duration_seconds: None,
            duration_range: None,
            tag_count: None,
            publish_hour: None,
        }
    }
}

/// The in-memory dataset handed between preprocessing steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoTable {
    pub rows: Vec<VideoRow>,
}

impl VideoTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Types the cells of a loaded file column by column. Only structural
    /// typing happens here: counters and category ids become integers, while
    /// timestamps and tags stay raw for [`crate::preprocess::preprocess`].
    pub fn from_raw(raw: &RawTable) -> Result<Self> {
        let columns = ColumnIndex::new(raw)?;
        let mut rows = Vec::with_capacity(raw.rows.len());
        for (index, cells) in raw.rows.iter().enumerate() {
            rows.push(columns.row(raw, index, cells)?);
        }
        Ok(Self { rows })
    }
}

impl From<Vec<VideoRecord>> for VideoTable {
    fn from(records: Vec<VideoRecord>) -> Self {
        Self {
            rows: records.into_iter().map(VideoRow::from).collect(),
        }
    }
}

/// Header positions resolved once per file.
struct ColumnIndex {
    video_id: usize,
    title: usize,
    description: usize,
    published_at: usize,
    channel_id: usize,
    channel_title: usize,
    category_id: Option<usize>,
    category_name: Option<usize>,
    tags: usize,
    duration: usize,
    definition: usize,
    caption: usize,
    view_count: usize,
    like_count: usize,
    dislike_count: usize,
    favorite_count: usize,
    comment_count: usize,
    country: Option<usize>,
}

impl ColumnIndex {
    fn new(raw: &RawTable) -> Result<Self> {
        let required = |name: &str| {
            raw.column_index(name).ok_or_else(|| {
                PipelineError::malformed_file(&raw.source, format!("missing column `{name}`"))
            })
        };
        Ok(Self {
            video_id: required("video_id")?,
            title: required("title")?,
            description: required("description")?,
            published_at: required("published_at")?,
            channel_id: required("channel_id")?,
            channel_title: required("channel_title")?,
            category_id: raw.column_index("category_id"),
            category_name: raw.column_index("category_name"),
            tags: required("tags")?,
            duration: required("duration")?,
            definition: required("definition")?,
            caption: required("caption")?,
            view_count: required("view_count")?,
            like_count: required("like_count")?,
            dislike_count: required("dislike_count")?,
            favorite_count: required("favorite_count")?,
            comment_count: required("comment_count")?,
            country: raw.column_index("country"),
        })
    }

    fn row(&self, raw: &RawTable, index: usize, cells: &[String]) -> Result<VideoRow> {
        if cells.len() != raw.headers.len() {
            return Err(PipelineError::malformed_file(
                &raw.source,
                format!(
                    "row {index} has {} fields, header has {}",
                    cells.len(),
                    raw.headers.len()
                ),
            ));
        }
        let cell = |position: usize| cells[position].clone();
        let optional = |position: Option<usize>| {
            position
                .map(|p| cells[p].trim())
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };
        let counter = |position: usize, column: &str| -> Result<u64> {
            let value = cells[position].trim();
            if value.is_empty() {
                return Ok(0);
            }
            value.parse().map_err(|_| {
                PipelineError::malformed_file(
                    &raw.source,
                    format!("row {index}: `{column}` is not an integer: {value:?}"),
                )
            })
        };
        let category_id = match optional(self.category_id) {
            Some(value) => Some(value.parse::<i64>().map_err(|_| {
                PipelineError::malformed_file(
                    &raw.source,
                    format!("row {index}: `category_id` is not an integer: {value:?}"),
                )
            })?),
            None => None,
        };

        Ok(VideoRow {
            video_id: cell(self.video_id),
            title: cell(self.title),
            description: Some(cell(self.description)).filter(|text| !text.is_empty()),
            published_at: PublishedAt::Raw(cell(self.published_at)),
            channel_id: cell(self.channel_id),
            channel_title: cell(self.channel_title),
            category_id,
            category_name: optional(self.category_name)
                .unwrap_or_else(|| UNKNOWN_CATEGORY.to_owned()),
            tags: Tags::Raw(cell(self.tags)),
            duration: cell(self.duration),
            definition: cell(self.definition),
            caption: Some(cell(self.caption))
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_CAPTION.to_owned()),
            view_count: counter(self.view_count, "view_count")?,
            like_count: counter(self.like_count, "like_count")?,
            dislike_count: counter(self.dislike_count, "dislike_count")?,
            favorite_count: counter(self.favorite_count, "favorite_count")?,
            comment_count: counter(self.comment_count, "comment_count")?,
            country: optional(self.country),
            duration_seconds: None,
            duration_range: None,
            tag_count: None,
            publish_hour: None,
        })
    }
}

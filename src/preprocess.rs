//! Cleaning and enrichment of a loaded trending dataset.
//!
//! [`preprocess`] fills defaults and resolves the textual columns
//! (`published_at`, `tags`) into typed values. It is idempotent: values that
//! are already parsed pass through untouched. The `derive_*` functions add
//! the secondary columns the charts consume; they never fail a batch, a row
//! whose input cannot be interpreted simply gets no derived value.

use std::str::FromStr;

use chrono::Timelike;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::record::{DurationRange, NO_DESCRIPTION, PublishedAt, Tags, VideoRow, VideoTable};

/// What to do with a row whose timestamp or tags cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowErrorPolicy {
    /// Remove the row, log it, keep going.
    #[default]
    Drop,
    /// Fail the whole batch with the row's `Parse` error.
    Abort,
}

impl FromStr for RowErrorPolicy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(RowErrorPolicy::Drop),
            "abort" => Ok(RowErrorPolicy::Abort),
            other => Err(format!("unknown parse error policy `{other}` (use drop or abort)")),
        }
    }
}

/// Fills missing descriptions, parses timestamps and materializes tags.
pub fn preprocess(table: VideoTable, policy: RowErrorPolicy) -> Result<VideoTable> {
    let mut rows = Vec::with_capacity(table.rows.len());
    for (index, row) in table.rows.into_iter().enumerate() {
        match preprocess_row(index, row) {
            Ok(row) => rows.push(row),
            Err(err) => match policy {
                RowErrorPolicy::Abort => return Err(err),
                RowErrorPolicy::Drop => warn!("dropping row: {err}"),
            },
        }
    }
    Ok(VideoTable { rows })
}

fn preprocess_row(index: usize, mut row: VideoRow) -> Result<VideoRow> {
    if row.description.as_deref().is_none_or(str::is_empty) {
        row.description = Some(NO_DESCRIPTION.to_owned());
    }

    let published_at = row
        .published_at
        .resolve()
        .map_err(|err| PipelineError::parse(index, "published_at", err.to_string()))?;
    row.published_at = PublishedAt::Parsed(published_at);

    let tags = row
        .tags
        .materialize()
        .map_err(|err| PipelineError::parse(index, "tags", err.to_string()))?;
    row.tags = Tags::Parsed(tags);

    Ok(row)
}

/// Runs every derivation in turn.
pub fn enrich(table: VideoTable) -> VideoTable {
    derive_publish_hour(derive_tag_count(derive_duration_fields(table)))
}

/// Fills `duration_seconds` and `duration_range` from the `duration` token.
pub fn derive_duration_fields(mut table: VideoTable) -> VideoTable {
    for (index, row) in table.rows.iter_mut().enumerate() {
        match parse_duration(&row.duration) {
            Ok(seconds) => {
                row.duration_seconds = Some(seconds);
                row.duration_range = DurationRange::from_seconds(seconds);
            }
            Err(err) => {
                debug!(row = index, "no duration fields: {err}");
                row.duration_seconds = None;
                row.duration_range = None;
            }
        }
    }
    table
}

/// Fills `tag_count`. Rows whose tags were never materialized get none.
pub fn derive_tag_count(mut table: VideoTable) -> VideoTable {
    for row in &mut table.rows {
        row.tag_count = row.tags.as_parsed().map(<[String]>::len);
    }
    table
}

/// Fills `publish_hour` with the hour of the parsed timestamp, in the offset
/// it was parsed with.
pub fn derive_publish_hour(mut table: VideoTable) -> VideoTable {
    for row in &mut table.rows {
        row.publish_hour = row.published_at.as_parsed().map(|ts| ts.hour());
    }
    table
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid duration {token:?}: {reason}")]
pub struct DurationParseError {
    token: String,
    reason: &'static str,
}

/// Parses the platform's ISO 8601 duration tokens (`PT4M13S`, `P1DT2H`,
/// `P0D`) into whole seconds.
///
/// Accepted shape: `P[nW][nD][T[nH][nM][nS]]` with designators in that order,
/// integer amounts only, and at least one component overall (and after `T`,
/// when present).
pub fn parse_duration(token: &str) -> std::result::Result<i64, DurationParseError> {
    let fail = |reason| DurationParseError {
        token: token.to_owned(),
        reason,
    };

    let body = token.trim().strip_prefix('P').ok_or_else(|| fail("missing P prefix"))?;
    let (date_part, time_part) = match body.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (body, None),
    };

    let mut total: i64 = 0;
    let mut components = 0;
    let mut add = |amount: i64, unit: i64| -> std::result::Result<(), DurationParseError> {
        let seconds = amount.checked_mul(unit).ok_or_else(|| fail("overflow"))?;
        total = total.checked_add(seconds).ok_or_else(|| fail("overflow"))?;
        components += 1;
        Ok(())
    };

    for (amount, unit) in components_of(date_part, &[('W', 604_800), ('D', 86_400)])
        .map_err(|reason| fail(reason))?
    {
        add(amount, unit)?;
    }

    if let Some(time_part) = time_part {
        let parsed = components_of(time_part, &[('H', 3_600), ('M', 60), ('S', 1)])
            .map_err(|reason| fail(reason))?;
        if parsed.is_empty() {
            return Err(fail("empty time section"));
        }
        for (amount, unit) in parsed {
            add(amount, unit)?;
        }
    }

    if components == 0 {
        return Err(fail("no components"));
    }
    Ok(total)
}

/// Splits `12H30M` style text into `(amount, seconds_per_unit)` pairs,
/// enforcing designator order.
fn components_of(
    section: &str,
    designators: &[(char, i64)],
) -> std::result::Result<Vec<(i64, i64)>, &'static str> {
    let mut parsed = Vec::new();
    let mut next_allowed = 0;
    let mut digits = String::new();

    for ch in section.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let position = designators
            .iter()
            .position(|(designator, _)| *designator == ch)
            .ok_or("unexpected character")?;
        if position < next_allowed {
            return Err("designators out of order");
        }
        if digits.is_empty() {
            return Err("designator without amount");
        }
        let amount: i64 = digits.parse().map_err(|_| "amount too large")?;
        parsed.push((amount, designators[position].1));
        digits.clear();
        next_allowed = position + 1;
    }

    if !digits.is_empty() {
        return Err("trailing digits without designator");
    }
    Ok(parsed)
}

//! Aggregations that feed the dashboard charts: missing-value counts, the
//! engagement correlation heatmap, per-category breakdowns and mean views by
//! duration bucket or publish hour.

use std::collections::BTreeMap;

use crate::record::{DurationRange, VideoRow, VideoTable};
use crate::stats::Metric;
use crate::storage::RawTable;

/// Empty cells per column of a loaded file, in header order.
pub fn missing_values(raw: &RawTable) -> Vec<(String, usize)> {
    raw.headers
        .iter()
        .enumerate()
        .map(|(index, header)| {
            let missing = raw
                .rows
                .iter()
                .filter(|row| row.get(index).is_none_or(|cell| cell.trim().is_empty()))
                .count();
            (header.clone(), missing)
        })
        .collect()
}

/// Pearson correlations between views, likes and comments.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub metrics: [Metric; 3],
    /// `None` where a column has no variance or there are fewer than two rows.
    pub values: [[Option<f64>; 3]; 3],
}

impl CorrelationMatrix {
    pub fn get(&self, a: Metric, b: Metric) -> Option<f64> {
        let i = self.metrics.iter().position(|m| *m == a)?;
        let j = self.metrics.iter().position(|m| *m == b)?;
        self.values[i][j]
    }
}

pub fn correlation_matrix(table: &VideoTable) -> CorrelationMatrix {
    let metrics = [Metric::Views, Metric::Likes, Metric::Comments];
    let columns = metrics.map(|metric| metric.values(table));
    let mut values = [[None; 3]; 3];
    for (i, left) in columns.iter().enumerate() {
        for (j, right) in columns.iter().enumerate() {
            values[i][j] = pearson(left, right);
        }
    }
    CorrelationMatrix { metrics, values }
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Rows per category, most frequent first (ties by name).
pub fn category_distribution(table: &VideoTable) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for row in &table.rows {
        *counts.entry(row.category_name.as_str()).or_default() += 1;
    }
    let mut distribution: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_owned(), count))
        .collect();
    distribution.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    distribution
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryEngagement {
    pub category: String,
    pub videos: usize,
    pub mean_views: f64,
    pub mean_likes: f64,
    pub mean_comments: f64,
}

/// Mean views, likes and comments per category, highest mean views first.
pub fn engagement_by_category(table: &VideoTable) -> Vec<CategoryEngagement> {
    let mut groups: BTreeMap<&str, Vec<&VideoRow>> = BTreeMap::new();
    for row in &table.rows {
        groups.entry(row.category_name.as_str()).or_default().push(row);
    }

    let mut engagement: Vec<CategoryEngagement> = groups
        .into_iter()
        .map(|(category, rows)| {
            let mean = |metric: Metric| {
                rows.iter().map(|row| metric.value(row) as f64).sum::<f64>() / rows.len() as f64
            };
            CategoryEngagement {
                category: category.to_owned(),
                videos: rows.len(),
                mean_views: mean(Metric::Views),
                mean_likes: mean(Metric::Likes),
                mean_comments: mean(Metric::Comments),
            }
        })
        .collect();
    engagement.sort_by(|a, b| b.mean_views.total_cmp(&a.mean_views));
    engagement
}

/// Mean view count of the rows falling into one bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketViews<K> {
    pub bucket: K,
    pub videos: usize,
    pub mean_views: Option<f64>,
}

/// One entry per duration bucket, in bucket order. Unbucketed rows are left
/// out.
pub fn views_by_duration_range(table: &VideoTable) -> Vec<BucketViews<DurationRange>> {
    DurationRange::ALL
        .iter()
        .map(|range| bucket_views(*range, table, |row| row.duration_range == Some(*range)))
        .collect()
}

/// One entry per hour of day, 0 through 23.
pub fn views_by_publish_hour(table: &VideoTable) -> Vec<BucketViews<u32>> {
    (0..24)
        .map(|hour| bucket_views(hour, table, |row| row.publish_hour == Some(hour)))
        .collect()
}

fn bucket_views<K>(
    bucket: K,
    table: &VideoTable,
    member: impl Fn(&VideoRow) -> bool,
) -> BucketViews<K> {
    let views: Vec<f64> = table
        .rows
        .iter()
        .filter(|row| member(row))
        .map(|row| row.view_count as f64)
        .collect();
    BucketViews {
        bucket,
        videos: views.len(),
        mean_views: (!views.is_empty()).then(|| views.iter().sum::<f64>() / views.len() as f64),
    }
}

/// The first `n` rows.
pub fn preview(table: &VideoTable, n: usize) -> &[VideoRow] {
    &table.rows[..n.min(table.rows.len())]
}

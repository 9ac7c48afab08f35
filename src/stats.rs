//! Descriptive statistics over the engagement counters.

use crate::record::{VideoRow, VideoTable};

/// Engagement counters that get summarized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Views,
    Likes,
    Dislikes,
    Comments,
}

impl Metric {
    pub const SUMMARIZED: [Metric; 4] = [
        Metric::Views,
        Metric::Likes,
        Metric::Dislikes,
        Metric::Comments,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Metric::Views => "view_count",
            Metric::Likes => "like_count",
            Metric::Dislikes => "dislike_count",
            Metric::Comments => "comment_count",
        }
    }

    pub fn value(self, row: &VideoRow) -> u64 {
        match self {
            Metric::Views => row.view_count,
            Metric::Likes => row.like_count,
            Metric::Dislikes => row.dislike_count,
            Metric::Comments => row.comment_count,
        }
    }

    pub fn values(self, table: &VideoTable) -> Vec<f64> {
        table
            .rows
            .iter()
            .map(|row| self.value(row) as f64)
            .collect()
    }
}

/// Count, mean, sample standard deviation, min, quartiles and max of one
/// column. Everything but `count` is missing for an empty column, and `std`
/// needs at least two values.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl Summary {
    pub fn of(values: &[f64]) -> Self {
        let count = values.len();
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mean = (count > 0).then(|| values.iter().sum::<f64>() / count as f64);
        let std = mean.filter(|_| count > 1).map(|mean| {
            let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (squares / (count - 1) as f64).sqrt()
        });

        Self {
            count,
            mean,
            std,
            min: sorted.first().copied(),
            q25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted.last().copied(),
        }
    }
}

/// Linear interpolation between the closest ranks of a sorted slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// One [`Summary`] per summarized counter, in [`Metric::SUMMARIZED`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    pub columns: Vec<(Metric, Summary)>,
}

impl SummaryTable {
    pub const STATISTICS: [&'static str; 8] =
        ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

    pub fn get(&self, metric: Metric) -> Option<&Summary> {
        self.columns
            .iter()
            .find(|(candidate, _)| *candidate == metric)
            .map(|(_, summary)| summary)
    }

    pub fn header(&self) -> Vec<&'static str> {
        std::iter::once("statistic")
            .chain(self.columns.iter().map(|(metric, _)| metric.column()))
            .collect()
    }

    /// One row per statistic; missing values are empty cells.
    pub fn rows(&self) -> Vec<Vec<String>> {
        Self::STATISTICS
            .iter()
            .map(|statistic| {
                let mut row = vec![statistic.to_string()];
                for (_, summary) in &self.columns {
                    let cell = match *statistic {
                        "count" => Some(summary.count as f64),
                        "mean" => summary.mean,
                        "std" => summary.std,
                        "min" => summary.min,
                        "25%" => summary.q25,
                        "50%" => summary.median,
                        "75%" => summary.q75,
                        _ => summary.max,
                    };
                    row.push(cell.map(|value| value.to_string()).unwrap_or_default());
                }
                row
            })
            .collect()
    }
}

/// Summarizes views, likes, dislikes and comments.
pub fn descriptive_stats(table: &VideoTable) -> SummaryTable {
    SummaryTable {
        columns: Metric::SUMMARIZED
            .iter()
            .map(|metric| (*metric, Summary::of(&metric.values(table))))
            .collect(),
    }
}

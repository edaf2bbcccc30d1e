//! Analytics view: chart models from the aggregate payload
//!
//! A render-once consumer: fetch `GET /api/analytics` a single time and
//! shape it into a sentiment pie chart and an emotion bar chart. Slice
//! and bar order follow the payload's key order.

use crate::client::{AnalyticsSummary, SubmitClient};
use crate::Result;

/// Pie slice palette for the sentiment chart
pub const SENTIMENT_PALETTE: [&str; 3] = ["#3498db", "#e74c3c", "#95a5a6"];

/// Bar color for the emotion chart
pub const EMOTION_COLOR: &str = "#9b59b6";

/// One pie slice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieSlice {
    /// Sentiment label
    pub label: String,
    /// Count
    pub value: u64,
    /// Fill color
    pub color: String,
}

/// Sentiment distribution pie chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieChart {
    /// Chart title
    pub title: String,
    /// Slices in payload key order
    pub slices: Vec<PieSlice>,
}

/// One bar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bar {
    /// Emotion label
    pub label: String,
    /// Count
    pub value: u64,
}

/// Emotion counts bar chart; the y-axis starts at zero
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarChart {
    /// Chart title
    pub title: String,
    /// Bars in payload key order
    pub bars: Vec<Bar>,
    /// Fill color
    pub color: String,
    /// Y-axis is zero-based
    pub zero_based: bool,
}

/// The completion-page analytics view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsView {
    /// Sentiment distribution
    pub sentiment: PieChart,
    /// Facial emotion counts
    pub emotion: BarChart,
}

impl AnalyticsView {
    /// Fetch the aggregate payload once and build both charts
    ///
    /// # Errors
    ///
    /// Returns error if the fetch fails or the payload does not decode
    pub async fn load(client: &SubmitClient) -> Result<Self> {
        let summary = client.fetch_analytics().await?;
        Ok(Self::from_summary(&summary))
    }

    /// Build both charts from an already-fetched payload
    #[must_use]
    pub fn from_summary(summary: &AnalyticsSummary) -> Self {
        Self {
            sentiment: sentiment_chart(summary),
            emotion: emotion_chart(summary),
        }
    }
}

/// Sentiment counts as a pie chart, palette cycling over key order
#[must_use]
pub fn sentiment_chart(summary: &AnalyticsSummary) -> PieChart {
    let slices = summary
        .sentiment_counts
        .iter()
        .enumerate()
        .map(|(i, (label, &value))| PieSlice {
            label: label.clone(),
            value,
            color: SENTIMENT_PALETTE[i % SENTIMENT_PALETTE.len()].to_string(),
        })
        .collect();

    PieChart {
        title: "Sentiment Distribution".to_string(),
        slices,
    }
}

/// Emotion counts as a zero-based bar chart
#[must_use]
pub fn emotion_chart(summary: &AnalyticsSummary) -> BarChart {
    let bars = summary
        .emotion_counts
        .iter()
        .map(|(label, &value)| Bar {
            label: label.clone(),
            value,
        })
        .collect();

    BarChart {
        title: "Facial Emotion Counts".to_string(),
        bars,
        color: EMOTION_COLOR.to_string(),
        zero_based: true,
    }
}

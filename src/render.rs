//! Chart descriptors and the rendering seam.
//!
//! Analysis steps describe the chart they would like drawn; they never draw
//! it. A [`Renderer`] supplied by the host turns a descriptor into an opaque
//! artifact reference (a file path, a URL, an id in some store).

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Heatmap,
    BoxPlot,
    Histogram,
    LineChart,
    BarChart,
    MissingValueMatrix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartDescriptor {
    pub kind: ChartKind,
    pub title: String,
    pub columns: Vec<String>,
}

impl ChartDescriptor {
    pub fn new(kind: ChartKind, title: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            columns,
        }
    }
}

/// Opaque reference to a rendered artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(pub String);

pub trait Renderer: Send + Sync {
    /// Render a chart. Failures are reported as a message and never abort
    /// the step that asked for the chart.
    fn render(&self, chart: &ChartDescriptor) -> Result<ArtifactRef, String>;
}

/// Renderer that only records what it was asked to draw.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    requests: Mutex<Vec<ChartDescriptor>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<ChartDescriptor> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, chart: &ChartDescriptor) -> Result<ArtifactRef, String> {
        let mut requests = self
            .requests
            .lock()
            .map_err(|_poisoned| "Lock poisoned".to_owned())?;
        requests.push(chart.clone());
        Ok(ArtifactRef(format!(
            "chart-{}-{:?}",
            requests.len(),
            chart.kind
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_renderer_issues_distinct_refs() {
        let renderer = RecordingRenderer::new();
        let chart = ChartDescriptor::new(ChartKind::Heatmap, "Correlations", vec!["a".to_owned()]);
        let first = renderer.render(&chart);
        let second = renderer.render(&chart);
        assert_ne!(first, second);
        assert_eq!(renderer.requests().len(), 2);
    }

    #[test]
    fn test_artifact_ref_serializes_as_string() -> serde_json::Result<()> {
        let json = serde_json::to_string(&ArtifactRef("charts/1.png".to_owned()))?;
        assert_eq!(json, "\"charts/1.png\"");
        Ok(())
    }
}

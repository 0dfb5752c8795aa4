//! Guided, multi-turn analysis sessions.
//!
//! Each call into this module is independent; the continuity lives in a
//! [`SessionStore`] that the caller owns and passes in. A session remembers
//! which dataset it was started on (by fingerprint), the optimization plan
//! from its first step, and an ordered history of completed steps.
//!
//! Continuations are serialized per session by rejection: while one step is
//! running, a second `continue_analysis` for the same session fails with
//! `SessionBusy` instead of waiting. A step's record is appended only after
//! the step has completed, so a failing step leaves the history untouched.

pub mod interest;
pub mod store;

pub use interest::{AnalysisArea, Interest, classify_interest, select_area};
pub use store::{SessionSlot, SessionStore};

use crate::dataset::{Table, fingerprint};
use crate::error::{Error, Result};
use crate::explore::{self, StepOutcome};
use crate::planner::{OptimizationPlan, PlannerConfig, apply_plan, plan_optimization};
use crate::profiler::{DatasetProfile, ProfilerConfig, SemanticType, profile};
use crate::render::{ArtifactRef, ChartDescriptor, Renderer};
use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Stored interest text is cut to this many characters.
pub const MAX_INPUT_CHARS: usize = 100;
const MAX_SUGGESTIONS: usize = 3;
const KEY_COLUMN_KEYWORDS: &[&str] = &[
    "id", "revenue", "cost", "profit", "amount", "price", "date", "customer",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions idle this long are expired on next access.
    pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 30 * 60,
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout_secs == 0 {
            return Err(Error::Validation(
                "sessions.idle_timeout_secs must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub area: AnalysisArea,
    pub question: String,
}

impl From<AnalysisArea> for Suggestion {
    fn from(area: AnalysisArea) -> Self {
        Self {
            area,
            question: area.question().to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based position in the history.
    pub sequence: usize,
    pub area: AnalysisArea,
    pub interest: Interest,
    /// What the user asked for, truncated.
    pub user_input: String,
    pub summary: String,
    pub findings: Vec<String>,
    pub chart: Option<ChartDescriptor>,
    pub artifact: Option<ArtifactRef>,
    pub render_error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidedSession {
    pub session_id: Uuid,
    pub dataset_fingerprint: String,
    pub goal: String,
    pub created_at: DateTime<Utc>,
    /// Plan from the initial step; later steps read the optimized view.
    pub plan: OptimizationPlan,
    pub history: Vec<StepRecord>,
    pub pending_recommendations: Vec<Suggestion>,
}

impl GuidedSession {
    pub fn new(dataset_fingerprint: String, goal: String, plan: OptimizationPlan) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            dataset_fingerprint,
            goal,
            created_at: Utc::now(),
            plan,
            history: Vec::new(),
            pending_recommendations: Vec::new(),
        }
    }

    /// Explorable areas already visited.
    pub fn covered_areas(&self) -> Vec<AnalysisArea> {
        self.history
            .iter()
            .map(|r| r.area)
            .filter(|a| AnalysisArea::EXPLORABLE.contains(a))
            .collect()
    }

    fn suggestions(&self, interest: Interest) -> Vec<Suggestion> {
        let covered = self.covered_areas();
        interest
            .ranking()
            .into_iter()
            .filter(|area| !covered.contains(area))
            .take(MAX_SUGGESTIONS)
            .map(Suggestion::from)
            .collect()
    }

    /// Append a completed step and refresh the suggestions.
    fn record(&mut self, area: AnalysisArea, interest: Interest, user_input: &str, step: Step) -> SessionReply {
        let record = StepRecord {
            sequence: self.history.len() + 1,
            area,
            interest,
            user_input: truncate_input(user_input),
            summary: step.outcome.summary,
            findings: step.outcome.findings,
            chart: step.outcome.chart,
            artifact: step.artifact,
            render_error: step.render_error,
            completed_at: Utc::now(),
        };
        let reply = SessionReply {
            session_id: self.session_id,
            step: record.sequence,
            area,
            summary: record.summary.clone(),
            findings: record.findings.clone(),
            next_suggestions: Vec::new(),
        };
        self.history.push(record);
        self.pending_recommendations = self.suggestions(interest);

        SessionReply {
            next_suggestions: self.pending_recommendations.clone(),
            ..reply
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReply {
    pub session_id: Uuid,
    /// Sequence number of the step just completed.
    pub step: usize,
    pub area: AnalysisArea,
    pub summary: String,
    pub findings: Vec<String>,
    pub next_suggestions: Vec<Suggestion>,
}

/// A completed step before it is recorded.
struct Step {
    outcome: StepOutcome,
    artifact: Option<ArtifactRef>,
    render_error: Option<String>,
}

/// Drives guided sessions against a shared [`SessionStore`].
pub struct SessionManager<'a> {
    store: &'a SessionStore,
    profiler: &'a ProfilerConfig,
    planner: &'a PlannerConfig,
    renderer: Option<&'a dyn Renderer>,
}

impl<'a> SessionManager<'a> {
    pub fn new(store: &'a SessionStore, profiler: &'a ProfilerConfig, planner: &'a PlannerConfig) -> Self {
        Self {
            store,
            profiler,
            planner,
            renderer: None,
        }
    }

    pub fn with_renderer(mut self, renderer: &'a dyn Renderer) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Create a session and run its initial profiling and planning step.
    pub fn start_guided_analysis<T: Table + ?Sized>(&self, table: &T, goal: &str) -> Result<SessionReply> {
        let profile = profile(table, self.profiler)?;
        let plan = plan_optimization(&profile, self.planner)?;
        let outcome = overview(table, &profile, &plan, goal)?;

        let mut session = GuidedSession::new(profile.fingerprint.clone(), goal.to_owned(), plan);
        let step = self.finish(outcome);
        let reply = session.record(AnalysisArea::Overview, Interest::General, goal, step);

        self.store.insert(session);
        tracing::info!(session_id = %reply.session_id, goal, "Guided analysis started");
        Ok(reply)
    }

    /// Run the next step of a session, steered by free-text interest.
    pub fn continue_analysis<T: Table + ?Sized>(
        &self,
        session_id: &Uuid,
        table: &T,
        user_interest: &str,
    ) -> Result<SessionReply> {
        let slot = self.store.get(session_id)?;
        let mut session = slot.try_lock()?;

        let actual = fingerprint(table)?;
        if actual != session.dataset_fingerprint {
            return Err(Error::ContextMismatch {
                expected: session.dataset_fingerprint.clone(),
                actual,
            });
        }

        let interest = classify_interest(user_interest);
        let area = select_area(interest, &session.covered_areas());
        tracing::info!(
            session_id = %session_id,
            interest = interest.as_str(),
            area = area.as_str(),
            "Continuing guided analysis"
        );

        let view = apply_plan(table, &session.plan)?;
        let outcome = run_area(area, &view, &session)?;
        let step = self.finish(outcome);

        let reply = session.record(area, interest, user_interest, step);
        slot.touch();
        Ok(reply)
    }

    pub fn end_session(&self, session_id: &Uuid) -> Result<()> {
        self.store.end_session(session_id)
    }

    /// Copy of a session's current state.
    pub fn snapshot(&self, session_id: &Uuid) -> Result<GuidedSession> {
        let slot = self.store.get(session_id)?;
        let session = slot.try_lock()?;
        Ok(session.clone())
    }

    /// Hand the step's chart to the renderer, if there is one. A render
    /// failure is recorded on the step, never raised.
    fn finish(&self, outcome: StepOutcome) -> Step {
        let (artifact, render_error) = match (self.renderer, outcome.chart.as_ref()) {
            (Some(renderer), Some(chart)) => match renderer.render(chart) {
                Ok(artifact) => (Some(artifact), None),
                Err(message) => {
                    tracing::warn!(chart = %chart.title, "Rendering failed: {message}");
                    (None, Some(message))
                }
            },
            _ => (None, None),
        };
        Step {
            outcome,
            artifact,
            render_error,
        }
    }
}

fn run_area(area: AnalysisArea, view: &DataFrame, session: &GuidedSession) -> Result<StepOutcome> {
    match area {
        AnalysisArea::Correlation => explore::correlation_step(view),
        AnalysisArea::Outliers => explore::outliers_step(view),
        AnalysisArea::Distributions => explore::distributions_step(view),
        AnalysisArea::Trends => explore::trends_step(view),
        AnalysisArea::Segments => explore::segments_step(view),
        AnalysisArea::MlReadiness => explore::ml_readiness_step(view),
        AnalysisArea::DataQuality => explore::data_quality_step(view),
        AnalysisArea::Insights | AnalysisArea::Overview => {
            let earlier: Vec<String> = session
                .history
                .iter()
                .map(|r| format!("{}: {}", r.area.as_str(), r.summary))
                .collect();
            Ok(explore::insights_step(view, &earlier))
        }
    }
}

fn overview<T: Table + ?Sized>(
    table: &T,
    profile: &DatasetProfile,
    plan: &OptimizationPlan,
    goal: &str,
) -> Result<StepOutcome> {
    let mut findings = vec![
        format!(
            "Memory plan shrinks {} columns ({:.1}% reduction{})",
            plan.changed_columns().count(),
            plan.percent_reduction,
            if plan.approximate { ", approximate" } else { "" }
        ),
        format!(
            "Estimated footprint: {} -> {} bytes",
            plan.total_bytes_before, plan.total_bytes_after
        ),
        format!("Estimated monthly storage savings: ${:.4}", plan.monthly_cost_delta),
        format!(
            "Dataset: {} rows x {} columns",
            profile.row_count, profile.column_count
        ),
        format!("Analysis goal: {goal}"),
    ];

    let count = |types: &[SemanticType]| {
        profile
            .columns
            .iter()
            .filter(|c| types.contains(&c.semantic_type))
            .count()
    };
    findings.push(format!(
        "Composition: {} numeric, {} text, {} categorical, {} datetime",
        count(&[SemanticType::Integer, SemanticType::Float]),
        count(&[SemanticType::Text]),
        count(&[SemanticType::Categorical]),
        count(&[SemanticType::Datetime])
    ));

    if profile.quality.missing_pct > 0.0 {
        findings.push(format!(
            "Missing data: {:.1}% of all values",
            profile.quality.missing_pct
        ));
    } else {
        findings.push("No missing data detected".to_owned());
    }

    let key_columns: Vec<String> = table
        .column_names()
        .into_iter()
        .filter(|name| is_key_column(name))
        .take(5)
        .collect();
    if !key_columns.is_empty() {
        findings.push(format!("Key columns identified: {}", key_columns.join(", ")));
    }
    if !profile.complete {
        findings.push("Profiling hit its time budget; figures cover the profiled columns only".to_owned());
    }

    Ok(StepOutcome {
        summary: format!(
            "Profiled {} columns; data quality {} ({:.1}/10); {}",
            profile.columns.len(),
            profile.quality.rating,
            profile.quality.score,
            plan.summary()
        ),
        findings,
        chart: None,
    })
}

fn is_key_column(name: &str) -> bool {
    let lowered = name.to_lowercase();
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .any(|word| {
            KEY_COLUMN_KEYWORDS
                .iter()
                .any(|k| word == *k || (k.len() > 2 && word.contains(k)))
        })
}

fn truncate_input(input: &str) -> String {
    if input.chars().count() > MAX_INPUT_CHARS {
        let head: String = input.chars().take(MAX_INPUT_CHARS).collect();
        format!("{head}...")
    } else {
        input.to_owned()
    }
}

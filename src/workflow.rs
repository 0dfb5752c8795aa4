//! Memory → Vectorization → Exploration as one run.
//!
//! A run walks a fixed state machine:
//!
//! ```text
//! Pending -> OptimizingMemory -> AdvisingVectorization -> Exploring -> Completed
//!                 \______________________\___________________\______-> Failed
//! ```
//!
//! Phases run strictly one after another and each reads what the previous one
//! produced: the memory phase builds the optimized view, and both later
//! phases read that view rather than the raw table. The first failure is
//! recorded verbatim, the failing phase is marked `failed` and every later
//! phase `skipped`. Nothing is retried.

use crate::advisor::{AdvisorConfig, VectorizationAdvice, advise_vectorization};
use crate::cancel::CancellationFlag;
use crate::dataset::Table;
use crate::error::{Error, Result};
use crate::explore::{ExplorationReport, explore};
use crate::planner::{OptimizationPlan, PlannerConfig, apply_plan, plan_optimization};
use crate::profiler::{ProfilerConfig, profile_until};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseName {
    MemoryOptimization,
    VectorizationAdvisory,
    Exploration,
}

impl PhaseName {
    /// Every phase, in execution order.
    pub const ALL: [Self; 3] = [
        Self::MemoryOptimization,
        Self::VectorizationAdvisory,
        Self::Exploration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MemoryOptimization => "MemoryOptimization",
            Self::VectorizationAdvisory => "VectorizationAdvisory",
            Self::Exploration => "Exploration",
        }
    }

    /// State the run is in while this phase executes.
    pub fn state(&self) -> WorkflowState {
        match self {
            Self::MemoryOptimization => WorkflowState::OptimizingMemory,
            Self::VectorizationAdvisory => WorkflowState::AdvisingVectorization,
            Self::Exploration => WorkflowState::Exploring,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Completed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Pending,
    OptimizingMemory,
    AdvisingVectorization,
    Exploring,
    Completed,
    Failed,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::OptimizingMemory => "optimizing_memory",
            Self::AdvisingVectorization => "advising_vectorization",
            Self::Exploring => "exploring",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// The state reached when the current step succeeds.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::OptimizingMemory),
            Self::OptimizingMemory => Some(Self::AdvisingVectorization),
            Self::AdvisingVectorization => Some(Self::Exploring),
            Self::Exploring => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Only single forward steps, or a jump to `Failed` from a running phase.
    pub fn can_transition_to(&self, target: Self) -> bool {
        match (self, target) {
            (
                Self::OptimizingMemory | Self::AdvisingVectorization | Self::Exploring,
                Self::Failed,
            ) => true,
            (from, to) => from.next() == Some(to),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase_name: PhaseName,
    pub duration_ms: u64,
    pub status: PhaseStatus,
    pub output_summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: String,
    pub message: String,
}

impl From<&Error> for Failure {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind().to_owned(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one run.
///
/// `plan`, `advice` and `exploration` only carry output from phases that
/// completed; a failed phase contributes nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub run_id: Uuid,
    pub analysis_goal: String,
    pub state: WorkflowState,
    pub phases: Vec<PhaseResult>,
    pub failure: Option<Failure>,
    pub plan: Option<OptimizationPlan>,
    pub advice: Option<Vec<VectorizationAdvice>>,
    pub exploration: Option<ExplorationReport>,
    pub total_duration_ms: u64,
}

impl WorkflowRun {
    fn new(analysis_goal: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            analysis_goal: analysis_goal.to_owned(),
            state: WorkflowState::Pending,
            phases: Vec::with_capacity(PhaseName::ALL.len()),
            failure: None,
            plan: None,
            advice: None,
            exploration: None,
            total_duration_ms: 0,
        }
    }

    fn transition(&mut self, target: WorkflowState) {
        debug_assert!(
            self.state.can_transition_to(target),
            "illegal transition {} -> {}",
            self.state.as_str(),
            target.as_str()
        );
        tracing::debug!(run_id = %self.run_id, from = self.state.as_str(), to = target.as_str(), "Workflow transition");
        self.state = target;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Budget for each phase, in seconds.
    pub phase_timeout_secs: u64,
    /// Operations the vectorization phase advises on.
    pub operations: Vec<String>,
    pub analysis_goal: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            phase_timeout_secs: 30,
            operations: vec!["mean".to_owned(), "scale".to_owned(), "groupby".to_owned()],
            analysis_goal: "general exploration".to_owned(),
        }
    }
}

impl WorkflowConfig {
    pub fn phase_timeout(&self) -> Duration {
        Duration::from_secs(self.phase_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.phase_timeout_secs == 0 {
            return Err(Error::Validation(
                "workflow.phase_timeout_secs must be positive".to_owned(),
            ));
        }
        if self.operations.is_empty() {
            return Err(Error::Validation(
                "workflow.operations must name at least one operation".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Everything a run needs.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowSettings<'a> {
    pub workflow: &'a WorkflowConfig,
    pub profiler: &'a ProfilerConfig,
    pub planner: &'a PlannerConfig,
    pub advisor: &'a AdvisorConfig,
}

/// State handed from phase to phase.
pub struct RunContext<'a> {
    pub table: &'a dyn Table,
    pub settings: WorkflowSettings<'a>,
    pub cancel: &'a CancellationFlag,
    /// Budget of each phase.
    pub budget: Duration,
    pub deadline: Instant,
    pub plan: Option<OptimizationPlan>,
    pub view: Option<DataFrame>,
    pub advice: Option<Vec<VectorizationAdvice>>,
    pub exploration: Option<ExplorationReport>,
}

impl RunContext<'_> {
    /// Drop whatever `phase` stored, so a failed phase leaves no output.
    fn discard(&mut self, phase: PhaseName) {
        match phase {
            PhaseName::MemoryOptimization => {
                self.plan = None;
                self.view = None;
            }
            PhaseName::VectorizationAdvisory => self.advice = None,
            PhaseName::Exploration => self.exploration = None,
        }
    }

    fn view(&self) -> Result<&DataFrame> {
        self.view.as_ref().ok_or_else(|| {
            Error::DataAccess("optimized view is not available before memory optimization".to_owned())
        })
    }
}

/// One step of the workflow.
pub trait Phase {
    fn name(&self) -> PhaseName;

    /// Run the phase, storing its output in the context, and return a
    /// one-line summary.
    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<String>;
}

struct MemoryOptimization;

impl Phase for MemoryOptimization {
    fn name(&self) -> PhaseName {
        PhaseName::MemoryOptimization
    }

    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<String> {
        let profile = profile_until(ctx.table, ctx.settings.profiler, ctx.deadline, ctx.cancel)?;
        if !profile.complete {
            return Err(Error::ComputationTimeout {
                what: format!(
                    "profiling ({} of {} columns done)",
                    profile.columns.len(),
                    profile.column_count
                ),
                budget: ctx.budget,
            });
        }
        let plan = plan_optimization(&profile, ctx.settings.planner)?;
        let view = apply_plan(ctx.table, &plan)?;
        let summary = plan.summary();
        ctx.plan = Some(plan);
        ctx.view = Some(view);
        Ok(summary)
    }
}

struct VectorizationAdvisory;

impl Phase for VectorizationAdvisory {
    fn name(&self) -> PhaseName {
        PhaseName::VectorizationAdvisory
    }

    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<String> {
        let view = ctx.view()?;
        let profile = crate::profiler::profile(view, ctx.settings.profiler)?;
        let advice = advise_vectorization(
            view,
            &profile,
            &ctx.settings.workflow.operations,
            ctx.settings.advisor,
        )?;

        let vectorizable = advice.iter().filter(|a| a.vectorizable).count();
        let best = advice
            .iter()
            .map(|a| a.estimated_speedup_factor)
            .fold(1.0_f64, f64::max);
        let summary = format!(
            "{vectorizable} of {} operations vectorizable; up to {best:.1}x faster",
            advice.len()
        );
        ctx.advice = Some(advice);
        Ok(summary)
    }
}

struct Exploration;

impl Phase for Exploration {
    fn name(&self) -> PhaseName {
        PhaseName::Exploration
    }

    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<String> {
        let report = explore(ctx.view()?)?;
        let summary = report.summary();
        ctx.exploration = Some(report);
        Ok(summary)
    }
}

fn phases() -> Vec<Box<dyn Phase>> {
    vec![
        Box::new(MemoryOptimization),
        Box::new(VectorizationAdvisory),
        Box::new(Exploration),
    ]
}

/// Run the workflow to completion or first failure.
///
/// Returns `Err` only for invalid configuration, before any phase runs.
/// Phase failures are reported inside the returned [`WorkflowRun`].
pub fn run_workflow<T: Table>(
    table: &T,
    settings: WorkflowSettings<'_>,
    cancel: &CancellationFlag,
) -> Result<WorkflowRun> {
    settings.workflow.validate()?;
    settings.profiler.validate()?;
    settings.planner.validate()?;
    settings.advisor.validate()?;

    Ok(run_phases(
        table,
        settings,
        cancel,
        phases(),
        settings.workflow.phase_timeout(),
    ))
}

/// Drive `phases` in order, each under `budget`.
fn run_phases(
    table: &dyn Table,
    settings: WorkflowSettings<'_>,
    cancel: &CancellationFlag,
    phases: Vec<Box<dyn Phase>>,
    budget: Duration,
) -> WorkflowRun {
    let started = Instant::now();
    let mut run = WorkflowRun::new(&settings.workflow.analysis_goal);
    tracing::info!(run_id = %run.run_id, goal = %run.analysis_goal, "Workflow started");

    let mut ctx = RunContext {
        table,
        settings,
        cancel,
        budget,
        deadline: started + budget,
        plan: None,
        view: None,
        advice: None,
        exploration: None,
    };

    for phase in phases {
        let name = phase.name();

        if run.state == WorkflowState::Failed {
            run.phases.push(PhaseResult {
                phase_name: name,
                duration_ms: 0,
                status: PhaseStatus::Skipped,
                output_summary: "skipped after earlier failure".to_owned(),
            });
            continue;
        }

        run.transition(name.state());
        let phase_start = Instant::now();
        ctx.deadline = phase_start + budget;

        let outcome = if cancel.is_cancelled() {
            Err(Error::Cancelled(format!("run cancelled before {}", name.as_str())))
        } else {
            phase.execute(&mut ctx).and_then(|summary| {
                let elapsed = phase_start.elapsed();
                if elapsed > budget {
                    Err(Error::ComputationTimeout {
                        what: name.as_str().to_owned(),
                        budget,
                    })
                } else {
                    Ok(summary)
                }
            })
        };
        let duration_ms = phase_start.elapsed().as_millis() as u64;

        match outcome {
            Ok(summary) => {
                tracing::info!(phase = name.as_str(), duration_ms, "{summary}");
                run.phases.push(PhaseResult {
                    phase_name: name,
                    duration_ms,
                    status: PhaseStatus::Completed,
                    output_summary: summary,
                });
            }
            Err(err) => {
                tracing::warn!(phase = name.as_str(), kind = err.kind(), "Phase failed: {err}");
                run.phases.push(PhaseResult {
                    phase_name: name,
                    duration_ms,
                    status: PhaseStatus::Failed,
                    output_summary: err.to_string(),
                });
                ctx.discard(name);
                run.failure = Some(Failure::from(&err));
                run.transition(WorkflowState::Failed);
            }
        }
    }

    if run.state != WorkflowState::Failed {
        run.transition(WorkflowState::Completed);
    }

    run.plan = ctx.plan;
    run.advice = ctx.advice;
    run.exploration = ctx.exploration;
    run.total_duration_ms = started.elapsed().as_millis() as u64;

    tracing::info!(
        run_id = %run.run_id,
        state = run.state.as_str(),
        total_ms = run.total_duration_ms,
        "Workflow finished"
    );
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn defaults() -> (WorkflowConfig, ProfilerConfig, PlannerConfig, AdvisorConfig) {
        (
            WorkflowConfig::default(),
            ProfilerConfig::default(),
            PlannerConfig::default(),
            AdvisorConfig::default(),
        )
    }

    fn names(run: &WorkflowRun) -> Vec<PhaseName> {
        run.phases.iter().map(|p| p.phase_name).collect()
    }

    #[test]
    fn test_state_transitions() {
        assert!(WorkflowState::Pending.can_transition_to(WorkflowState::OptimizingMemory));
        assert!(WorkflowState::Exploring.can_transition_to(WorkflowState::Completed));
        assert!(WorkflowState::OptimizingMemory.can_transition_to(WorkflowState::Failed));
        assert!(!WorkflowState::Pending.can_transition_to(WorkflowState::Exploring));
        assert!(!WorkflowState::Completed.can_transition_to(WorkflowState::Failed));
        assert!(!WorkflowState::Exploring.can_transition_to(WorkflowState::OptimizingMemory));
        assert_eq!(WorkflowState::Completed.next(), None);
        assert!(WorkflowState::Failed.is_terminal());
    }

    #[test]
    fn test_successful_run() -> Result<()> {
        let df = df!(
            "id" => (0..50i64).collect::<Vec<_>>(),
            "score" => (0..50).map(|i| f64::from(i) * 1.5).collect::<Vec<_>>(),
            "group" => (0..50).map(|i| ["a", "b"][i % 2]).collect::<Vec<_>>()
        )?;
        let (w, p, pl, a) = defaults();
        let settings = WorkflowSettings {
            workflow: &w,
            profiler: &p,
            planner: &pl,
            advisor: &a,
        };
        let run = run_workflow(&df, settings, &CancellationFlag::new())?;

        assert_eq!(run.state, WorkflowState::Completed);
        assert_eq!(names(&run), PhaseName::ALL.to_vec());
        assert!(run.phases.iter().all(|p| p.status == PhaseStatus::Completed));
        assert!(run.failure.is_none());
        assert_eq!(run.advice.as_ref().map(Vec::len), Some(3));

        // Exploration saw the optimized view.
        let report = run.exploration.as_ref().expect("exploration report");
        assert!(report.dtype_counts.contains_key("u8"));
        Ok(())
    }

    #[test]
    fn test_cancelled_run_skips_remaining_phases() -> Result<()> {
        let df = df!("x" => &[1i64, 2, 3])?;
        let (w, p, pl, a) = defaults();
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let settings = WorkflowSettings {
            workflow: &w,
            profiler: &p,
            planner: &pl,
            advisor: &a,
        };
        let run = run_workflow(&df, settings, &cancel)?;

        assert_eq!(run.state, WorkflowState::Failed);
        assert_eq!(names(&run), PhaseName::ALL.to_vec());
        let statuses: Vec<_> = run.phases.iter().map(|p| p.status).collect();
        assert_eq!(
            statuses,
            vec![PhaseStatus::Failed, PhaseStatus::Skipped, PhaseStatus::Skipped]
        );
        assert_eq!(run.failure.as_ref().map(|f| f.kind.as_str()), Some("cancelled"));
        assert!(run.plan.is_none());
        Ok(())
    }

    struct FailingAdvisory;

    impl Phase for FailingAdvisory {
        fn name(&self) -> PhaseName {
            PhaseName::VectorizationAdvisory
        }

        fn execute(&self, _ctx: &mut RunContext<'_>) -> Result<String> {
            Err(Error::DataAccess("advisor backend unavailable".to_owned()))
        }
    }

    /// Memory optimization that starts with its deadline already gone.
    struct LateMemoryOptimization;

    impl Phase for LateMemoryOptimization {
        fn name(&self) -> PhaseName {
            PhaseName::MemoryOptimization
        }

        fn execute(&self, ctx: &mut RunContext<'_>) -> Result<String> {
            ctx.deadline = Instant::now();
            MemoryOptimization.execute(ctx)
        }
    }

    /// Memory optimization that finishes, then overruns the budget.
    struct SlowMemoryOptimization(Duration);

    impl Phase for SlowMemoryOptimization {
        fn name(&self) -> PhaseName {
            PhaseName::MemoryOptimization
        }

        fn execute(&self, ctx: &mut RunContext<'_>) -> Result<String> {
            let summary = MemoryOptimization.execute(ctx)?;
            std::thread::sleep(self.0);
            Ok(summary)
        }
    }

    fn statuses(run: &WorkflowRun) -> Vec<PhaseStatus> {
        run.phases.iter().map(|p| p.status).collect()
    }

    #[test]
    fn test_later_phase_failure_skips_the_rest() -> Result<()> {
        let df = df!("x" => &[1i64, 2, 3])?;
        let (w, p, pl, a) = defaults();
        let settings = WorkflowSettings {
            workflow: &w,
            profiler: &p,
            planner: &pl,
            advisor: &a,
        };
        let phases: Vec<Box<dyn Phase>> = vec![
            Box::new(MemoryOptimization),
            Box::new(FailingAdvisory),
            Box::new(Exploration),
        ];
        let run = run_phases(&df, settings, &CancellationFlag::new(), phases, w.phase_timeout());

        assert_eq!(names(&run), PhaseName::ALL.to_vec());
        assert_eq!(
            statuses(&run),
            vec![PhaseStatus::Completed, PhaseStatus::Failed, PhaseStatus::Skipped]
        );
        assert_eq!(run.state, WorkflowState::Failed);
        assert_eq!(
            run.failure.as_ref().map(|f| f.kind.as_str()),
            Some("data_access_error")
        );
        // Output of the completed phase survives; nothing after the failure.
        assert!(run.plan.is_some());
        assert!(run.advice.is_none());
        assert!(run.exploration.is_none());
        Ok(())
    }

    #[test]
    fn test_incomplete_profile_times_out() -> Result<()> {
        let df = df!("x" => &[1i64, 2, 3], "y" => &[0.5f64, 1.5, 2.5])?;
        let (w, p, pl, a) = defaults();
        let settings = WorkflowSettings {
            workflow: &w,
            profiler: &p,
            planner: &pl,
            advisor: &a,
        };
        let phases: Vec<Box<dyn Phase>> = vec![
            Box::new(LateMemoryOptimization),
            Box::new(VectorizationAdvisory),
            Box::new(Exploration),
        ];
        let run = run_phases(&df, settings, &CancellationFlag::new(), phases, w.phase_timeout());

        assert_eq!(
            statuses(&run),
            vec![PhaseStatus::Failed, PhaseStatus::Skipped, PhaseStatus::Skipped]
        );
        assert_eq!(run.state, WorkflowState::Failed);
        let failure = run.failure.as_ref().expect("failure recorded");
        assert_eq!(failure.kind, "computation_timeout");
        assert!(failure.message.contains("profiling"), "{}", failure.message);
        assert!(run.plan.is_none());
        Ok(())
    }

    #[test]
    fn test_over_budget_phase_fails_without_output() -> Result<()> {
        let df = df!("x" => &[1i64, 2, 3])?;
        let (w, p, pl, a) = defaults();
        let settings = WorkflowSettings {
            workflow: &w,
            profiler: &p,
            planner: &pl,
            advisor: &a,
        };
        let budget = Duration::from_millis(200);
        let phases: Vec<Box<dyn Phase>> = vec![
            Box::new(SlowMemoryOptimization(budget * 2)),
            Box::new(VectorizationAdvisory),
            Box::new(Exploration),
        ];
        let run = run_phases(&df, settings, &CancellationFlag::new(), phases, budget);

        assert_eq!(
            statuses(&run),
            vec![PhaseStatus::Failed, PhaseStatus::Skipped, PhaseStatus::Skipped]
        );
        assert_eq!(run.state, WorkflowState::Failed);
        assert_eq!(
            run.failure.as_ref().map(|f| f.kind.as_str()),
            Some("computation_timeout")
        );
        assert!(run.plan.is_none(), "a failed phase must not publish its plan");
        Ok(())
    }

    #[test]
    fn test_invalid_config_produces_no_run() -> Result<()> {
        let df = df!("x" => &[1i64])?;
        let (mut w, p, mut pl, a) = defaults();
        pl.epsilon = -1.0;
        let settings = WorkflowSettings {
            workflow: &w,
            profiler: &p,
            planner: &pl,
            advisor: &a,
        };
        let err = run_workflow(&df, settings, &CancellationFlag::new()).unwrap_err();
        assert_eq!(err.kind(), "validation_error");

        pl.epsilon = 1e-6;
        w.operations.clear();
        let settings = WorkflowSettings {
            workflow: &w,
            profiler: &p,
            planner: &pl,
            advisor: &a,
        };
        assert!(run_workflow(&df, settings, &CancellationFlag::new()).is_err());
        Ok(())
    }
}

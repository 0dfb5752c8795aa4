//! Facade over the engine's public operations.
//!
//! [`Engine`] owns the configuration and the session store, so a transport
//! layer needs exactly one value to serve every call. Each method returns
//! `Result<T>`, which converts into a [`crate::response::Response`].

use crate::advisor::{self, VectorizationAdvice};
use crate::cancel::CancellationFlag;
use crate::config::CoreConfig;
use crate::dataset::Table;
use crate::error::Result;
use crate::methodology::{self, Explanation};
use crate::planner::{self, OptimizationPlan};
use crate::profiler::{self, ColumnProfile, DatasetProfile};
use crate::render::Renderer;
use crate::session::{GuidedSession, SessionManager, SessionReply, SessionStore};
use crate::workflow::{self, WorkflowRun};
use uuid::Uuid;

pub struct Engine {
    config: CoreConfig,
    store: SessionStore,
    renderer: Option<Box<dyn Renderer>>,
}

impl Engine {
    /// Build an engine; the configuration is validated up front.
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;
        let store = SessionStore::new(config.sessions.idle_timeout());
        Ok(Self {
            config,
            store,
            renderer: None,
        })
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn sessions(&self) -> SessionManager<'_> {
        let manager = SessionManager::new(&self.store, &self.config.profiler, &self.config.planner);
        match self.renderer.as_deref() {
            Some(renderer) => manager.with_renderer(renderer),
            None => manager,
        }
    }

    /// Per-column statistics in source order.
    pub fn profile<T: Table + ?Sized>(&self, table: &T) -> Result<Vec<ColumnProfile>> {
        Ok(profiler::profile(table, &self.config.profiler)?.columns)
    }

    /// Full dataset profile including the quality summary.
    pub fn overview<T: Table + ?Sized>(&self, table: &T) -> Result<DatasetProfile> {
        profiler::profile(table, &self.config.profiler)
    }

    pub fn plan_optimization<T: Table + ?Sized>(&self, table: &T) -> Result<OptimizationPlan> {
        let profile = profiler::profile(table, &self.config.profiler)?;
        planner::plan_optimization(&profile, &self.config.planner)
    }

    pub fn advise_vectorization<T: Table + ?Sized>(
        &self,
        table: &T,
        operations: &[String],
    ) -> Result<Vec<VectorizationAdvice>> {
        let profile = profiler::profile(table, &self.config.profiler)?;
        advisor::advise_vectorization(table, &profile, operations, &self.config.advisor)
    }

    pub fn run_workflow<T: Table>(&self, table: &T, cancel: &CancellationFlag) -> Result<WorkflowRun> {
        workflow::run_workflow(table, self.config.workflow_settings(), cancel)
    }

    pub fn start_session<T: Table + ?Sized>(&self, table: &T, goal: &str) -> Result<SessionReply> {
        self.store.purge_expired();
        self.sessions().start_guided_analysis(table, goal)
    }

    pub fn continue_session<T: Table + ?Sized>(
        &self,
        session_id: &Uuid,
        table: &T,
        user_interest: &str,
    ) -> Result<SessionReply> {
        self.sessions().continue_analysis(session_id, table, user_interest)
    }

    pub fn end_session(&self, session_id: &Uuid) -> Result<()> {
        self.sessions().end_session(session_id)
    }

    pub fn session(&self, session_id: &Uuid) -> Result<GuidedSession> {
        self.sessions().snapshot(session_id)
    }

    pub fn explain_methodology(&self, topic: &str) -> Explanation {
        methodology::explain_methodology(topic, &self.config.planner)
    }
}

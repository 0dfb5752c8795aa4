use crate::cancel::CancellationFlag;
use crate::config::CoreConfig;
use crate::dataset::load_df;
use crate::engine::Engine;
use crate::error::Result;
use crate::planner::OptimizationLevel;
use crate::response::Response;
use crate::session::{GuidedSession, SessionReply};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tabsmith",
    about = "Memory planning, vectorization advice and guided analysis for tabular data"
)]
pub struct Cli {
    /// Path to a JSON config file. Defaults to <config_dir>/tabsmith/config.json
    #[arg(long, global = true, env = "TABSMITH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Profile every column and summarise data quality
    Profile {
        /// Dataset to read (CSV, Parquet, JSON)
        file: PathBuf,
    },
    /// Plan the smallest safe representation for each column
    Plan {
        file: PathBuf,

        /// conservative, production or aggressive
        #[arg(long)]
        level: Option<OptimizationLevel>,

        /// Maximum relative error tolerated when narrowing floats
        #[arg(long)]
        epsilon: Option<f64>,
    },
    /// Advise which operations benefit from vectorized execution
    Advise {
        file: PathBuf,

        /// Operations to advise on
        #[arg(long = "op", value_delimiter = ',', default_value = "mean,scale,groupby")]
        operations: Vec<String>,

        /// Time both execution paths on a sample instead of using the lookup table
        #[arg(long)]
        measure: bool,
    },
    /// Run memory optimization, vectorization advice and exploration in order
    Workflow {
        file: PathBuf,

        /// What the analysis is for
        #[arg(long)]
        goal: Option<String>,

        #[arg(long)]
        level: Option<OptimizationLevel>,
    },
    /// Start a guided session and continue it once per interest
    Guided {
        file: PathBuf,

        #[arg(long, default_value = "general exploration")]
        goal: String,

        /// Free-text interest for each continuation, in order
        #[arg(short, long = "interest")]
        interests: Vec<String>,
    },
    /// Explain the methodology behind a topic
    Explain {
        #[arg(default_value = "general")]
        topic: String,
    },
}

/// Every reply of a scripted guided session plus its final state.
#[derive(Debug, Serialize, Deserialize)]
pub struct GuidedTranscript {
    pub replies: Vec<SessionReply>,
    pub session: GuidedSession,
}

fn load_config(path: Option<&PathBuf>) -> Result<CoreConfig> {
    CoreConfig::load(path.map(PathBuf::as_path))
}

fn envelope<T: Serialize>(result: Result<T>) -> Result<String> {
    Response::from(result).to_json()
}

/// Run one command and render its JSON envelope.
///
/// Operation failures are rendered inside the envelope; only a failure to
/// serialize the envelope itself is returned as `Err`.
pub fn run_command(cli: Cli) -> Result<String> {
    let config = load_config(cli.config.as_ref());

    match cli.command {
        Commands::Profile { file } => envelope(config.and_then(|config| {
            let engine = Engine::new(config)?;
            engine.overview(&load_df(&file)?)
        })),
        Commands::Plan {
            file,
            level,
            epsilon,
        } => envelope(config.and_then(|mut config| {
            if let Some(level) = level {
                config.planner.level = level;
            }
            if let Some(epsilon) = epsilon {
                config.planner.epsilon = epsilon;
            }
            let engine = Engine::new(config)?;
            engine.plan_optimization(&load_df(&file)?)
        })),
        Commands::Advise {
            file,
            operations,
            measure,
        } => envelope(config.and_then(|mut config| {
            config.advisor.measure |= measure;
            let engine = Engine::new(config)?;
            engine.advise_vectorization(&load_df(&file)?, &operations)
        })),
        Commands::Workflow { file, goal, level } => envelope(config.and_then(|mut config| {
            if let Some(goal) = goal {
                config.workflow.analysis_goal = goal;
            }
            if let Some(level) = level {
                config.planner.level = level;
            }
            let engine = Engine::new(config)?;
            engine.run_workflow(&load_df(&file)?, &CancellationFlag::new())
        })),
        Commands::Guided {
            file,
            goal,
            interests,
        } => envelope(config.and_then(|config| guided(config, &file, &goal, &interests))),
        Commands::Explain { topic } => envelope(config.and_then(|config| {
            let engine = Engine::new(config)?;
            Ok(engine.explain_methodology(&topic))
        })),
    }
}

fn guided(
    config: CoreConfig,
    file: &std::path::Path,
    goal: &str,
    interests: &[String],
) -> Result<GuidedTranscript> {
    let engine = Engine::new(config)?;
    let df = load_df(file)?;

    let first = engine.start_session(&df, goal)?;
    let session_id = first.session_id;
    let mut replies = vec![first];
    for interest in interests {
        replies.push(engine.continue_session(&session_id, &df, interest)?);
    }

    let session = engine.session(&session_id)?;
    engine.end_session(&session_id)?;
    Ok(GuidedTranscript { replies, session })
}

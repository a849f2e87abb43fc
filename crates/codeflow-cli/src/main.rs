//! CLI binary for running and inspecting codeflow pipelines.
//!
//! The `demo` command wires the engine to the in-memory fakes so the whole
//! pipeline — classification, discovery, generation, retry, escalation,
//! publication — can be exercised end to end without any real backends.

use std::sync::Arc;

use clap::{Parser, Subcommand};

use codeflow_collab::fakes::{
    FlakyBuilder, InMemoryGraph, InMemorySource, ScriptedGenerator, StaticSearchIndex,
};
use codeflow_collab::{Collaborators, SearchHit};
use codeflow_pipeline::Engine;
use codeflow_types::{CodeUnit, PipelineState, RunStatus, Settings, UnitKind};

#[derive(Parser)]
#[command(name = "codeflow", version, about = "Agentic code-change pipeline runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted demo pipeline against in-memory collaborators
    Demo {
        /// The change or explanation request
        requirement: String,

        /// Repository reference the run operates on
        #[arg(short, long, default_value = "acme/orders")]
        repo: String,

        /// Fail this many build attempts before going green, to exercise
        /// the retry/escalation loop
        #[arg(long, default_value = "0")]
        fail_builds: usize,

        /// Reply to use if the run pauses for human input
        #[arg(long)]
        reply: Option<String>,

        /// Retry ceiling shared by the build and review loops
        #[arg(long, default_value = "3")]
        max_attempts: u32,
    },

    /// Compile the canonical stage graph and report validation results
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Demo {
            requirement,
            repo,
            fail_builds,
            reply,
            max_attempts,
        } => {
            cmd_demo(&requirement, &repo, fail_builds, reply.as_deref(), max_attempts).await?;
        }
        Commands::Validate => cmd_validate()?,
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// demo
// ---------------------------------------------------------------------------

/// A small order-service corpus: one type, one method, the backing file,
/// and canned generation responses for every stage that asks.
fn demo_collaborators(fail_builds: usize) -> Collaborators {
    let analysis = r#"{"task_type": "change", "domain": "order", "confidence": 0.95,
        "open_questions": [], "modifies_code": true, "needs_code_context": true,
        "is_casual": false}"#;
    let selection = r#"{"files_to_modify": [{"path": "src/order_service.rs",
        "target_symbol": "OrderService.process", "target_methods": ["process"],
        "reason": "guard the customer lookup"}],
        "reasoning": "only process() dereferences the customer",
        "estimated_complexity": "low"}"#;
    let edit = |n: usize| {
        format!(
            r#"{{"files": [{{"path": "src/order_service.rs",
                "content": "pub struct OrderService; // revision {n}",
                "summary": "guard customer lookup (revision {n})"}}], "notes": ""}}"#
        )
    };
    let review = r#"{"approved": true, "issues": [], "summary": "guard is correct and tested"}"#;

    let mut responses = vec![analysis.to_string(), selection.to_string()];
    for n in 1..=5 {
        responses.push(edit(n));
    }
    responses.push(review.to_string());

    let mut collab = codeflow_collab::fakes::scripted_collaborators(responses);
    collab.graph = Arc::new(
        InMemoryGraph::new()
            .with_unit(CodeUnit {
                id: "t1".into(),
                qualified_name: "OrderService".into(),
                kind: UnitKind::Type,
                file_path: "src/order_service.rs".into(),
                domain: "order".into(),
                purpose: "order lifecycle".into(),
                dependencies: vec![],
            })
            .with_unit(CodeUnit {
                id: "m1".into(),
                qualified_name: "OrderService.process".into(),
                kind: UnitKind::Method,
                file_path: "src/order_service.rs".into(),
                domain: "order".into(),
                purpose: "order processing entry point".into(),
                dependencies: vec![],
            }),
    );
    collab.search = Arc::new(StaticSearchIndex::new(vec![SearchHit {
        id: "m1".into(),
        score: 0.93,
        snippet: "fn process(&self)".into(),
        symbol_name: "OrderService.process".into(),
    }]));
    collab.source = Arc::new(
        InMemorySource::new().with_file("src/order_service.rs", "pub struct OrderService;"),
    );
    collab.builder = Arc::new(FlakyBuilder::new(
        fail_builds,
        "error[E0308]: mismatched types",
    ));
    collab
}

async fn cmd_demo(
    requirement: &str,
    repo: &str,
    fail_builds: usize,
    reply: Option<&str>,
    max_attempts: u32,
) -> anyhow::Result<()> {
    let settings = Settings {
        max_attempts,
        ..Settings::default()
    };
    let engine = Engine::new(demo_collaborators(fail_builds), settings)?;
    tracing::info!(repo, fail_builds, "starting demo run");

    let mut events = engine.events();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("[{:>3}%] {}: {}", event.percent_complete, event.stage_name, event.message);
        }
    });

    let mut state = engine.start(requirement, repo).await;
    if state.status == RunStatus::Paused {
        println!("\n-- paused --");
        println!("{}", state.last_decision.explanation());
        if let Some(reply) = reply {
            println!("-- resuming with: {reply} --\n");
            state = engine.resume(state, reply).await;
        }
    }
    printer.abort();

    print_summary(&state);
    Ok(())
}

fn print_summary(state: &PipelineState) {
    println!("\nrun {:?} ({} stage decisions recorded)", state.status, state.conversation_history.len());
    println!("  conversation: {}", state.conversation_id);
    println!("  build attempts: {}, review attempts: {}", state.build_attempt, state.review_attempt);
    if let Some(scope) = &state.scope {
        println!("  scope: {} file(s), complexity {:?}", scope.total_files(), scope.estimated_complexity);
    }
    if let Some(url) = &state.change_request_url {
        println!("  change request: {url}");
    }
    if let Some(explanation) = &state.explanation {
        println!("  explanation: {explanation}");
    }
    println!("  last decision: {} — {}", state.last_decision.kind(), state.last_decision.explanation());
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn cmd_validate() -> anyhow::Result<()> {
    // The canonical graph compiles against any collaborator set; the fakes
    // keep this command dependency-free.
    let generator = Arc::new(ScriptedGenerator::new(vec![]));
    let mut collab = codeflow_collab::fakes::scripted_collaborators(vec![]);
    collab.generator = generator;

    codeflow_pipeline::canonical_graph(collab, Settings::default())?;
    println!("canonical graph: OK");
    Ok(())
}

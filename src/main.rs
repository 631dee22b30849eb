use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use flowgraph_compiler::{compile, CompileError, Severity};
use flowgraph_diagram::{DomainDiagram, ExecutionId, NodeId};
use flowgraph_events::{EventStore, StateStore};
use flowgraph_handlers::{builtin_registry, ServiceBundle};
use flowgraph_router::MessageRouter;
use flowgraph_scheduler::{run, RunOptions, SchedulerContext, SchedulerError};

/// flowgraph - a directed-diagram compiler and execution engine
#[derive(Parser)]
#[command(name = "flowgraph")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a diagram, or a single node within it
  Run {
    /// Path to the diagram file (native-form JSON)
    diagram_file: PathBuf,

    /// Run only this node, against an otherwise empty execution state
    #[arg(long)]
    node: Option<String>,

    #[arg(long)]
    max_parallel_nodes: Option<usize>,

    #[arg(long)]
    timeout_seconds: Option<u64>,

    #[arg(long)]
    max_iterations: Option<u64>,
  },

  /// Compile a diagram and report validation issues without running it
  Validate {
    /// Path to the diagram file (native-form JSON)
    diagram_file: PathBuf,
  },
}

fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  match dispatch() {
    Ok(code) => code,
    Err(err) => {
      eprintln!("error: {err:#}");
      ExitCode::from(3)
    }
  }
}

fn dispatch() -> Result<ExitCode> {
  let cli = Cli::parse();
  let rt = tokio::runtime::Runtime::new().context("failed to start the tokio runtime")?;

  match cli.command {
    Commands::Run {
      diagram_file,
      node,
      max_parallel_nodes,
      timeout_seconds,
      max_iterations,
    } => rt.block_on(run_cmd(diagram_file, node, max_parallel_nodes, timeout_seconds, max_iterations)),
    Commands::Validate { diagram_file } => rt.block_on(validate_cmd(diagram_file)),
  }
}

async fn read_diagram(diagram_file: &PathBuf) -> Result<DomainDiagram> {
  let content = tokio::fs::read_to_string(diagram_file)
    .await
    .with_context(|| format!("failed to read diagram file: {}", diagram_file.display()))?;
  serde_json::from_str(&content).with_context(|| format!("failed to parse diagram file: {}", diagram_file.display()))
}

fn diagram_id_from_path(diagram_file: &PathBuf) -> String {
  diagram_file
    .file_stem()
    .and_then(|s| s.to_str())
    .unwrap_or("diagram")
    .to_string()
}

async fn validate_cmd(diagram_file: PathBuf) -> Result<ExitCode> {
  let diagram = read_diagram(&diagram_file).await?;

  match compile(&diagram) {
    Ok((executable, issues)) => {
      for issue in &issues {
        eprintln!("{:?}: {}", issue.severity, issue.message);
      }
      eprintln!(
        "diagram is valid: {} nodes, {} edges",
        executable.nodes().len(),
        executable.edges().len()
      );
      Ok(ExitCode::from(0))
    }
    Err(CompileError::Aborted(issues)) => {
      for issue in &issues {
        if issue.severity == Severity::Error {
          eprintln!("error: {}", issue.message);
        } else {
          eprintln!("{:?}: {}", issue.severity, issue.message);
        }
      }
      Ok(ExitCode::from(2))
    }
  }
}

async fn run_cmd(
  diagram_file: PathBuf,
  node: Option<String>,
  max_parallel_nodes: Option<usize>,
  timeout_seconds: Option<u64>,
  max_iterations: Option<u64>,
) -> Result<ExitCode> {
  let diagram = read_diagram(&diagram_file).await?;
  let diagram_id = diagram_id_from_path(&diagram_file);

  let (executable, issues) = match compile(&diagram) {
    Ok(result) => result,
    Err(CompileError::Aborted(issues)) => {
      for issue in &issues {
        eprintln!("error: {}", issue.message);
      }
      return Ok(ExitCode::from(2));
    }
  };
  for issue in issues.iter().filter(|i| i.severity != Severity::Error) {
    eprintln!("{:?}: {}", issue.severity, issue.message);
  }
  let executable = Arc::new(executable);

  let variables = read_payload_from_stdin()?;
  let variables = match variables {
    Value::Object(map) => map,
    Value::Null => serde_json::Map::new(),
    other => {
      let mut map = serde_json::Map::new();
      map.insert("default".into(), other);
      map
    }
  };

  let mut options = RunOptions {
    variables,
    ..RunOptions::default()
  };
  if let Some(n) = max_parallel_nodes {
    options.max_parallel_nodes = n;
  }
  if let Some(s) = timeout_seconds {
    options.timeout_seconds = s;
  }
  if let Some(i) = max_iterations {
    options.max_iterations = i;
  }

  let (router, control_rx) = MessageRouter::new(64);
  let ctx = SchedulerContext {
    handlers: Arc::new(builtin_registry()),
    services: ServiceBundle::default(),
    events: Arc::new(EventStore::new()),
    states: Arc::new(StateStore::new()),
    router: Arc::new(router),
  };

  if let Some(node_id) = node {
    return run_single_node(&ctx, &executable, NodeId::from(node_id.as_str()), &options).await;
  }

  let execution_id = ExecutionId::from(uuid::Uuid::new_v4().to_string());
  eprintln!("starting execution {execution_id} for diagram {diagram_id}");

  let outcome = run(
    &ctx,
    executable,
    execution_id.clone(),
    diagram_id,
    options,
    control_rx,
    CancellationToken::new(),
  )
  .await;

  match outcome {
    Ok(state) => {
      eprintln!("execution {} finished: {:?}", execution_id, state.status);
      let output: serde_json::Map<String, Value> = state
        .node_outputs
        .iter()
        .map(|(id, output)| (id.to_string(), output.value_ref().clone()))
        .collect();
      println!("{}", serde_json::to_string_pretty(&output)?);
      Ok(ExitCode::from(0))
    }
    Err(err) => {
      eprintln!("execution {execution_id} failed: {err}");
      Ok(ExitCode::from(exit_code_for(&err)))
    }
  }
}

/// Dispatches a single node directly against a services-only context,
/// bypassing the step loop. Used by `run --node`, which has no use for
/// readiness scheduling across the rest of the diagram.
async fn run_single_node(
  ctx: &SchedulerContext,
  diagram: &Arc<flowgraph_compiled::ExecutableDiagram>,
  node_id: NodeId,
  options: &RunOptions,
) -> Result<ExitCode> {
  let node = diagram
    .get_node(&node_id)
    .with_context(|| format!("node '{node_id}' not found in diagram"))?
    .clone();

  let execution_id = ExecutionId::from(uuid::Uuid::new_v4().to_string());
  let mut state = flowgraph_state::ExecutionState::new(
    execution_id,
    diagram,
    diagram_id_placeholder(),
    options.max_iterations,
  );
  state.variables = options.variables.clone();

  let inputs = flowgraph_resolve::resolve_inputs(&node, diagram, &state);
  let mut merged = state.variables.clone();
  merged.extend(inputs);

  match ctx.handlers.dispatch(&node, &merged, &ctx.services).await {
    Ok(output) => {
      println!("{}", serde_json::to_string_pretty(output.value_ref())?);
      Ok(ExitCode::from(0))
    }
    Err(err) => {
      eprintln!("node {node_id} failed: {err}");
      Ok(ExitCode::from(3))
    }
  }
}

fn diagram_id_placeholder() -> String {
  "adhoc".into()
}

fn exit_code_for(err: &SchedulerError) -> u8 {
  match err {
    SchedulerError::Aborted => 4,
    SchedulerError::ExecutionTimedOut | SchedulerError::NodeTimedOut(_) => 5,
    SchedulerError::State(_) | SchedulerError::DeadlockDetected(_) | SchedulerError::ExecutionFailed(_) => 3,
  }
}

fn read_payload_from_stdin() -> Result<Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(Value::Null);
  }

  let mut input = String::new();
  io::stdin().read_to_string(&mut input).context("failed to read payload from stdin")?;
  if input.trim().is_empty() {
    Ok(Value::Null)
  } else {
    serde_json::from_str(&input).context("failed to parse payload JSON from stdin")
  }
}

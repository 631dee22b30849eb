use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use flowgraph_compiled::CompiledNode;
use flowgraph_diagram::{CodeLanguage, NodeData};
use flowgraph_state::NodeOutput;

use crate::error::HandlerError;
use crate::handler::NodeHandler;
use crate::services::ServiceBundle;

/// Runs `code` in a fresh interpreter process per the node's `language`,
/// feeding the resolved inputs to it as JSON on stdin and reading its
/// stdout as the result. Stdout is parsed as JSON when possible, otherwise
/// kept as a raw string (the `code_job → raw_text` default content type).
/// The per-node deadline named in `timeout` is enforced by the scheduler
/// wrapping this call in a timeout, not by this handler.
pub struct CodeJobHandler;

#[async_trait]
impl NodeHandler for CodeJobHandler {
  async fn execute(&self, node: &CompiledNode, inputs: &Map<String, Value>, _: &ServiceBundle) -> Result<NodeOutput, HandlerError> {
    let NodeData::CodeJob { language, code, .. } = &node.data else {
      return Err(HandlerError::InvalidShape("code_job handler received a non-code_job node".into()));
    };

    let (program, args) = interpreter(language);
    let mut child = Command::new(program)
      .args(args)
      .arg(code)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|e| HandlerError::Failed(format!("failed to spawn {program}: {e}")))?;

    let payload = Value::Object(inputs.clone()).to_string();
    if let Some(mut stdin) = child.stdin.take() {
      stdin
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| HandlerError::Failed(format!("failed to write stdin: {e}")))?;
      // dropped here, closing the pipe so the child's read loop sees EOF
    }

    let output = child
      .wait_with_output()
      .await
      .map_err(|e| HandlerError::Failed(format!("failed to await {program}: {e}")))?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(HandlerError::Failed(format!("{program} exited with {}: {stderr}", output.status)));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let value = serde_json::from_str(&stdout).unwrap_or(Value::String(stdout));
    Ok(NodeOutput::value(value))
  }
}

fn interpreter(language: &CodeLanguage) -> (&'static str, &'static [&'static str]) {
  match language {
    CodeLanguage::Python => ("python3", &["-c"]),
    CodeLanguage::JavaScript => ("node", &["-e"]),
    CodeLanguage::Bash => ("bash", &["-c"]),
    CodeLanguage::Typescript => ("deno", &["eval"]),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn python_maps_to_python3_dash_c() {
    assert_eq!(interpreter(&CodeLanguage::Python), ("python3", &["-c"] as &[&str]));
  }

  #[test]
  fn bash_maps_to_bash_dash_c() {
    assert_eq!(interpreter(&CodeLanguage::Bash), ("bash", &["-c"] as &[&str]));
  }
}

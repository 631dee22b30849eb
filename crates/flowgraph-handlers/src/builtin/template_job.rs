use async_trait::async_trait;
use serde_json::{Map, Value};

use flowgraph_compiled::CompiledNode;
use flowgraph_diagram::NodeData;
use flowgraph_state::NodeOutput;

use crate::error::HandlerError;
use crate::handler::NodeHandler;
use crate::services::ServiceBundle;

/// Renders `template`, substituting `{key}` placeholders with the matching
/// resolved input, stringified. A placeholder with no matching input is
/// left untouched.
pub struct TemplateJobHandler;

#[async_trait]
impl NodeHandler for TemplateJobHandler {
  async fn execute(&self, node: &CompiledNode, inputs: &Map<String, Value>, _: &ServiceBundle) -> Result<NodeOutput, HandlerError> {
    let NodeData::TemplateJob { template } = &node.data else {
      return Err(HandlerError::InvalidShape("template_job handler received a non-template_job node".into()));
    };

    let mut rendered = template.clone();
    for (key, value) in inputs {
      let placeholder = format!("{{{key}}}");
      let replacement = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
      };
      rendered = rendered.replace(&placeholder, &replacement);
    }

    Ok(NodeOutput::value(Value::String(rendered)))
  }
}

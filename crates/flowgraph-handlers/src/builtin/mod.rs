mod code_job;
mod condition;
mod db;
mod endpoint;
mod start;
mod template_job;

pub use code_job::CodeJobHandler;
pub use condition::ConditionHandler;
pub use db::DbHandler;
pub use endpoint::EndpointHandler;
pub use start::StartHandler;
pub use template_job::TemplateJobHandler;

use flowgraph_diagram::NodeType;

use crate::registry::HandlerRegistry;

/// A registry preloaded with the structural/utility handlers this crate
/// ships (§4.8 module list). Node types without a listed built-in
/// (`person_job`, `person_batch_job`, `api_job`, `user_response`, `hook`,
/// `notion`) are left unregistered — an embedder registers those against
/// its own LLM/HTTP/Notion-backed implementations.
pub fn builtin_registry() -> HandlerRegistry {
  let mut registry = HandlerRegistry::new();
  registry.register(NodeType::Start, Box::new(StartHandler));
  registry.register(NodeType::Endpoint, Box::new(EndpointHandler));
  registry.register(NodeType::Condition, Box::new(ConditionHandler));
  registry.register(NodeType::CodeJob, Box::new(CodeJobHandler));
  registry.register(NodeType::Db, Box::new(DbHandler));
  registry.register(NodeType::TemplateJob, Box::new(TemplateJobHandler));
  registry
}

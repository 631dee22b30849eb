mod builtin;
mod error;
mod handler;
mod registry;
mod services;

pub use builtin::{builtin_registry, CodeJobHandler, ConditionHandler, DbHandler, EndpointHandler, StartHandler, TemplateJobHandler};
pub use error::HandlerError;
pub use handler::NodeHandler;
pub use registry::HandlerRegistry;
pub use services::{ApiKeyService, FileService, InMemoryMemoryService, LlmService, MemoryService, NotionService, ServiceBundle};

//! 工具箱：time / weather / news 与统一的注册、执行、schema

pub mod executor;
pub mod news;
pub mod registry;
pub mod schema;
pub mod time;
pub mod weather;

pub use executor::ToolExecutor;
pub use news::NewsTool;
pub use registry::{Tool, ToolDescriptor, ToolRegistry, ToolResult};
pub use schema::tool_call_schema_json;
pub use time::TimeTool;
pub use weather::WeatherTool;

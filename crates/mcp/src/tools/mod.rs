pub mod basic;
pub mod fetch;
pub mod info;
pub mod reminder;
pub mod tracker;
mod registry;

pub use basic::{CalculateTool, CurrentTimeTool, EchoTool};
pub use fetch::{FetchedPage, PageFetcher};
pub use info::SaveInfoTool;
pub use reminder::ReminderTool;
pub use tracker::TrackerTool;
pub use registry::{
    json_schema_array, json_schema_boolean, json_schema_enum, json_schema_number,
    json_schema_object, json_schema_string, parse_args, required, Tool, ToolError, ToolRegistry,
};

pub mod command;

pub use command::{CommandTool, ToolRequest};

use crate::config::ToolSettings;
use crate::orchestration::tool_dispatch::ToolDispatchTable;

pub fn dispatch_table_from_settings(tools: &[ToolSettings]) -> ToolDispatchTable {
    let mut table = ToolDispatchTable::new();
    for settings in tools {
        table.register(CommandTool::from_settings(settings));
    }
    table
}

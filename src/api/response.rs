use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

use crate::error::{AppError, Result};

pub fn success(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text)])
}

pub fn json<T: Serialize>(data: &T) -> Result<CallToolResult> {
    Ok(success(serde_json::to_string(data)?))
}

/// Maps an application error onto the caller-visible result. Argument
/// problems are protocol errors; everything else is a failed tool call.
pub fn error(err: AppError) -> std::result::Result<CallToolResult, McpError> {
    match err {
        AppError::InvalidArguments(msg) => Err(McpError::invalid_params(msg, None)),
        other => Ok(CallToolResult::error(vec![Content::text(other.to_string())])),
    }
}

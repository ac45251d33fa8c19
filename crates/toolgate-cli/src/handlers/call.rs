//! Tool call handler.

use anyhow::Result;
use toolgate_core::ToolArguments;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Parse `--args` into tool arguments. Absent means no arguments.
pub fn parse_arguments(raw: Option<&str>) -> Result<ToolArguments, CliError> {
    let Some(raw) = raw else {
        return Ok(ToolArguments::new());
    };
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map.into_iter().collect()),
        Ok(other) => Err(CliError::Arguments(format!(
            "--args must be a JSON object, got {other}"
        ))),
        Err(e) => Err(CliError::Arguments(format!("--args is not valid JSON: {e}"))),
    }
}

/// Resolve and call a tool, printing its result.
pub async fn execute(
    ctx: &CliContext,
    owner: &str,
    tool: &str,
    args: Option<&str>,
    token: &str,
) -> Result<()> {
    let arguments = parse_arguments(args)?;
    let result = ctx
        .service()
        .call_tool(owner, tool, arguments, token)
        .await?;

    if let Some(data) = result.data.as_ref() {
        println!("{}", serde_json::to_string_pretty(data)?);
    }

    if result.success {
        Ok(())
    } else {
        let message = result
            .error
            .unwrap_or_else(|| "tool reported an error".to_string());
        Err(CliError::Gateway(format!("Tool '{tool}' failed: {message}")).into())
    }
}

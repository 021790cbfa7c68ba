use anyhow::Result;

use crate::commands::{CommandResult, ShellState};
use crate::permissions::{Operation, Permission};
use crate::persistence::LogEvent;
use crate::tools::SHELL_TOOL;

/// Shell passthrough command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellPassthrough {
    pub command: String,
}

/// Run an external command after the permission and approval checks, and
/// record its outcome in the session
pub async fn execute_shell_command(
    cmd: ShellPassthrough,
    state: &mut ShellState,
) -> Result<CommandResult> {
    if cmd.command.is_empty() {
        return Ok(CommandResult::Message("Usage: !<command>".to_string()));
    }

    let operation = Operation::ExecuteTool {
        tool: SHELL_TOOL,
        command: &cmd.command,
    };
    if let Permission::Denied(reason) = state.manager.permissions().check(&operation) {
        tracing::warn!("Refused command {:?}: {}", cmd.command, reason);
        state.memory.record(LogEvent::action(
            "command_blocked",
            Some(format!("{}: {}", cmd.command, reason)),
        ))?;
        return Ok(CommandResult::Message(format!("🚫 Command refused: {}", reason)));
    }

    let approved = state.gate.check(
        state.confirmer.as_mut(),
        &mut state.memory,
        &cmd.command,
        SHELL_TOOL,
    )?;
    if !approved {
        return Ok(CommandResult::Message("Command not executed.".to_string()));
    }

    tracing::info!("Executing shell command: {}", cmd.command);
    let outcome = state.runner.run(&cmd.command).await?;
    outcome.record(&mut state.memory)?;

    Ok(CommandResult::Message(format!(
        "$ {}\n\n{}",
        cmd.command, outcome.output
    )))
}

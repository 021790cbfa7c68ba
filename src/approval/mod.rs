//! Confirmation gate for sensitive actions.
//!
//! Scans and captures touch other people's networks, so the shell asks the
//! operator before running them. Every answer is written to the session log
//! as an `approval_decision` event; an action whose decision cannot be
//! recorded does not run.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use crate::config::ApprovalConfig;
use crate::error::SessionResult;
use crate::persistence::{ConversationMemory, LogEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn icon(&self) -> &str {
        match self {
            RiskLevel::Low => "🟢",
            RiskLevel::Medium => "🟡",
            RiskLevel::High => "🔴",
        }
    }
}

/// Source of operator answers
pub trait Confirmer {
    /// Show `prompt` and return the operator's answer, or `None` on end of input
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>>;

    /// Show informational text
    fn show(&mut self, text: &str) -> io::Result<()>;
}

/// Reads answers from stdin, writes prompts to stdout
#[derive(Debug, Default)]
pub struct ConsoleConfirmer;

impl Confirmer for ConsoleConfirmer {
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        print!("{}", prompt);
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    fn show(&mut self, text: &str) -> io::Result<()> {
        println!("{}", text);
        Ok(())
    }
}

/// Replays canned answers; records what was shown
#[derive(Debug, Default)]
pub struct ScriptedConfirmer {
    answers: VecDeque<String>,
    pub transcript: Vec<String>,
}

impl ScriptedConfirmer {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            transcript: Vec::new(),
        }
    }
}

impl Confirmer for ScriptedConfirmer {
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.transcript.push(prompt.to_string());
        Ok(self.answers.pop_front())
    }

    fn show(&mut self, text: &str) -> io::Result<()> {
        self.transcript.push(text.to_string());
        Ok(())
    }
}

/// Interpret a yes/no answer. `None` means the answer was not understood.
pub fn parse_answer(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" | "s" | "si" | "sí" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Decides which actions need confirmation and runs the prompt
#[derive(Debug, Clone)]
pub struct ApprovalGate {
    config: ApprovalConfig,
}

impl ApprovalGate {
    pub fn new(config: ApprovalConfig) -> Self {
        Self { config }
    }

    /// Keywords from the configuration found in `command`
    pub fn matched_keywords(&self, command: &str) -> Vec<String> {
        let lower = command.to_lowercase();
        self.config
            .sensitive_keywords
            .iter()
            .filter(|k| lower.contains(&k.to_lowercase()))
            .cloned()
            .collect()
    }

    pub fn is_sensitive(&self, command: &str, tool: &str) -> bool {
        self.config.sensitive_tools.iter().any(|t| t == tool)
            || !self.matched_keywords(command).is_empty()
    }

    pub fn risk_level(&self, command: &str, tool: &str) -> RiskLevel {
        if self.config.sensitive_tools.iter().any(|t| t == tool) {
            RiskLevel::High
        } else if self.matched_keywords(command).is_empty() {
            RiskLevel::Low
        } else {
            RiskLevel::Medium
        }
    }

    /// Risk notes shown to the operator before asking
    pub fn risks(&self, command: &str, tool: &str) -> Vec<String> {
        let mut risks: Vec<String> = self
            .matched_keywords(command)
            .into_iter()
            .map(|k| format!("command mentions '{}'", k))
            .collect();
        if self.config.sensitive_tools.iter().any(|t| t == tool) {
            risks.push(format!("'{}' always requires confirmation", tool));
        }
        risks.push("only target hosts and networks you are authorized to test".to_string());
        risks
    }

    /// Ask when needed and record the decision. Non-sensitive actions, or a
    /// disabled gate, are approved without a prompt or a log entry.
    pub fn check(
        &self,
        confirmer: &mut dyn Confirmer,
        memory: &mut ConversationMemory,
        command: &str,
        tool: &str,
    ) -> SessionResult<bool> {
        if !self.config.enabled || !self.is_sensitive(command, tool) {
            return Ok(true);
        }
        let risks = self.risks(command, tool);
        let level = self.risk_level(command, tool);
        self.request_confirmation(confirmer, memory, command, level, &risks)
    }

    /// Prompt until the operator answers yes or no. End of input declines.
    pub fn request_confirmation(
        &self,
        confirmer: &mut dyn Confirmer,
        memory: &mut ConversationMemory,
        action: &str,
        level: RiskLevel,
        risks: &[String],
    ) -> SessionResult<bool> {
        let mut banner = String::new();
        banner.push_str(&"=".repeat(70));
        banner.push_str("\n⚠️  CONFIRMATION REQUIRED\n");
        banner.push_str(&"=".repeat(70));
        banner.push_str(&format!("\n\n📋 Action: {}\n", action));
        banner.push_str(&format!("{} Risk: {}\n", level.icon(), level.as_str()));
        if !risks.is_empty() {
            banner.push_str("\n⚠️  Potential risks:\n");
            for risk in risks {
                banner.push_str(&format!("   • {}\n", risk));
            }
        }
        // Display problems must not block the decision itself
        let _ = confirmer.show(&banner);

        let approved = loop {
            match confirmer.ask("Continue with this action? [y/n]: ") {
                Ok(Some(answer)) => match parse_answer(&answer) {
                    Some(decision) => break decision,
                    None => {
                        let _ = confirmer.show("Please answer 'y' for yes or 'n' for no.");
                    }
                },
                Ok(None) => break false,
                Err(e) => {
                    tracing::warn!("Failed to read confirmation: {}", e);
                    break false;
                }
            }
        };

        memory.record(LogEvent::approval(action, approved))?;

        let _ = confirmer.show(if approved {
            "✅ Action approved"
        } else {
            "❌ Action cancelled"
        });
        tracing::info!("Approval for {:?}: {}", action, approved);
        Ok(approved)
    }
}

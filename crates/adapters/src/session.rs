// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux process utilities.
//!
//! One long-lived session per tenant; each agent run gets its own window.
//! Window liveness doubles as process liveness: when the agent command
//! exits, tmux closes the window.

use std::path::Path;
use std::time::Duration;

use crate::error::AdapterError;
use crate::Result;

/// Escape a string for a shell single-quoted context (`'\''` idiom).
/// Values are validated identifiers or paths, but quoting keeps spaces in
/// agent-type strings intact.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Adapter over the `tmux` binary.
#[derive(Clone)]
pub struct TmuxSessions {
    bin: String,
}

impl Default for TmuxSessions {
    fn default() -> Self {
        Self::new()
    }
}

impl TmuxSessions {
    pub fn new() -> Self {
        Self { bin: "tmux".to_string() }
    }

    pub fn with_binary(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output> {
        tokio::process::Command::new(&self.bin)
            .args(args)
            .output()
            .await
            .map_err(|e| AdapterError::Tmux(format!("failed to run tmux: {e}")))
    }

    async fn run_ok(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args).await?;
        if !output.status.success() {
            return Err(AdapterError::Tmux(format!(
                "tmux {} failed: {}",
                args.first().unwrap_or(&""),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    pub async fn session_exists(&self, session: &str) -> Result<bool> {
        let output = self.run(&["has-session", "-t", session]).await?;
        Ok(output.status.success())
    }

    /// Create the session if it does not exist. Detached, with a throwaway
    /// first window so agent windows can be addressed by name.
    pub async fn ensure_session(&self, session: &str) -> Result<()> {
        if self.session_exists(session).await? {
            return Ok(());
        }
        self.run_ok(&["new-session", "-d", "-s", session, "-n", "idle"]).await?;
        Ok(())
    }

    /// Spawn a command in a new window. Environment pairs are exported in
    /// front of the command; names are validated identifiers, values are
    /// quoted.
    pub async fn spawn_window(
        &self,
        session: &str,
        window: &str,
        cwd: &Path,
        env: &[(String, String)],
        command: &str,
    ) -> Result<()> {
        let exports: String = env
            .iter()
            .map(|(name, value)| format!("{}={} ", name, shell_quote(value)))
            .collect();
        let full = format!("{exports}{command}");
        let cwd = cwd.to_string_lossy();
        self.run_ok(&["new-window", "-d", "-t", session, "-n", window, "-c", &cwd, &full])
            .await?;
        Ok(())
    }

    /// Whether the window (and so the agent process) is still alive.
    pub async fn window_alive(&self, session: &str, window: &str) -> Result<bool> {
        let output = self.run(&["list-windows", "-t", session, "-F", "#{window_name}"]).await?;
        if !output.status.success() {
            // Session gone entirely
            return Ok(false);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().any(|line| line.trim() == window))
    }

    /// Capture recent pane output for a window (last `lines` lines).
    pub async fn capture(&self, session: &str, window: &str, lines: u32) -> Result<String> {
        let target = format!("{session}:{window}");
        let start = format!("-{lines}");
        self.run_ok(&["capture-pane", "-t", &target, "-p", "-S", &start]).await
    }

    pub async fn kill_window(&self, session: &str, window: &str) -> Result<()> {
        let target = format!("{session}:{window}");
        // Already-gone windows are fine
        let _ = self.run(&["kill-window", "-t", &target]).await?;
        Ok(())
    }

    pub async fn kill_session(&self, session: &str) -> Result<()> {
        let _ = self.run(&["kill-session", "-t", session]).await?;
        Ok(())
    }

    /// Poll until the window disappears (agent exited) or the deadline
    /// passes. Returns true when the window exited on its own.
    pub async fn wait_window_exit(
        &self,
        session: &str,
        window: &str,
        poll: Duration,
        deadline: Duration,
    ) -> Result<bool> {
        let give_up = tokio::time::Instant::now() + deadline;
        loop {
            if !self.window_alive(session, window).await? {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= give_up {
                return Ok(false);
            }
            tokio::time::sleep(poll).await;
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

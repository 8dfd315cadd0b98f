//! Command execution over SSH
//!
//! Provides the `CommandOutput` struct and `exec_command` for running one
//! command on a fresh exec channel under a read deadline.

use std::time::Duration;

use russh::ChannelMsg;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::session::SshSession;
use crate::error::{DeployError, Result};

/// Output from a command execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output from the command
    pub stdout: String,

    /// Standard error from the command
    pub stderr: String,

    /// Exit code of the command (if the server reported one)
    pub exit_code: Option<u32>,
}

impl CommandOutput {
    /// Create a new empty CommandOutput
    pub fn new() -> Self {
        Self::default()
    }

    /// Output of a command that exited 0
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// Check if the command succeeded
    ///
    /// Only an explicit exit status of 0 counts. A channel that closed
    /// without reporting one (killed by a signal, dropped) is a failure.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Get combined output (stdout + stderr)
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

impl SshSession {
    /// Execute a command over SSH
    ///
    /// Opens a new exec channel, then collects stdout, stderr and the exit
    /// status until the server closes the channel. Exceeding
    /// `timeout_duration` fails with `Timeout`; the remote process is left
    /// running.
    pub async fn exec_command(
        &self,
        command: &str,
        timeout_duration: Duration,
    ) -> Result<CommandOutput> {
        let channel = self.open_channel().await?;

        debug!("Executing remote command ({} bytes)", command.len());
        channel
            .exec(true, command)
            .await
            .map_err(|e| DeployError::remote(format!("Failed to exec command: {}", e)))?;

        match timeout(timeout_duration, collect_channel_output(channel)).await {
            Ok(output) => Ok(output),
            Err(_) => {
                warn!(
                    "Command timed out after {}ms",
                    timeout_duration.as_millis()
                );
                Err(DeployError::Timeout(timeout_duration.as_millis() as u64))
            }
        }
    }
}

/// Accumulates channel messages into a [`CommandOutput`]
///
/// Bytes are buffered raw and decoded once at the end, so a UTF-8
/// sequence split across two packets survives intact.
#[derive(Debug, Default)]
struct OutputCollector {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: Option<u32>,
}

impl OutputCollector {
    /// Record one message; returns `false` once the channel is closed
    fn push(&mut self, msg: ChannelMsg) -> bool {
        match msg {
            ChannelMsg::Data { data } => self.stdout.extend_from_slice(&data),
            // ext == 1 is stderr
            ChannelMsg::ExtendedData { data, ext: 1 } => self.stderr.extend_from_slice(&data),
            ChannelMsg::ExtendedData { data, .. } => self.stdout.extend_from_slice(&data),
            ChannelMsg::ExitStatus { exit_status } => self.exit_code = Some(exit_status),
            ChannelMsg::ExitSignal { signal_name, .. } => {
                warn!("Remote command terminated by signal {:?}", signal_name);
            }
            ChannelMsg::Close => return false,
            _ => {}
        }
        true
    }

    fn finish(self) -> CommandOutput {
        CommandOutput {
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
            exit_code: self.exit_code,
        }
    }
}

/// Collect output from a channel until it closes
///
/// The exit status usually arrives after EOF, so only `Close` (or the end
/// of the message stream) stops collection.
async fn collect_channel_output(mut channel: russh::Channel<russh::client::Msg>) -> CommandOutput {
    let mut collector = OutputCollector::default();

    while let Some(msg) = channel.wait().await {
        if !collector.push(msg) {
            break;
        }
    }

    let output = collector.finish();
    debug!(
        "Command completed: exit_code={:?}, stdout_len={}, stderr_len={}",
        output.exit_code,
        output.stdout.len(),
        output.stderr.len()
    );

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh::CryptoVec;

    #[test]
    fn test_command_output_success() {
        assert!(CommandOutput::ok("hello").success());
    }

    #[test]
    fn test_command_output_failure() {
        let output = CommandOutput {
            stdout: String::new(),
            stderr: "error".to_string(),
            exit_code: Some(1),
        };
        assert!(!output.success());
    }

    #[test]
    fn test_command_output_no_exit_code() {
        let output = CommandOutput {
            stdout: "hello".to_string(),
            stderr: String::new(),
            exit_code: None,
        };
        assert!(!output.success());
    }

    #[test]
    fn test_command_output_combined() {
        let output = CommandOutput {
            stdout: "stdout".to_string(),
            stderr: "stderr".to_string(),
            exit_code: Some(0),
        };
        assert_eq!(output.combined_output(), "stdout\nstderr");
    }

    #[test]
    fn test_command_output_combined_only_stderr() {
        let output = CommandOutput {
            stdout: String::new(),
            stderr: "stderr".to_string(),
            exit_code: Some(1),
        };
        assert_eq!(output.combined_output(), "stderr");
    }

    fn data(bytes: &[u8]) -> ChannelMsg {
        ChannelMsg::Data {
            data: CryptoVec::from(bytes),
        }
    }

    #[test]
    fn test_collector_joins_split_utf8() {
        let check = "✔ Container web  Started".as_bytes();
        let mut collector = OutputCollector::default();

        // Split inside the three-byte check mark
        assert!(collector.push(data(&check[..2])));
        assert!(collector.push(data(&check[2..])));
        assert!(collector.push(ChannelMsg::ExtendedData {
            data: CryptoVec::from("─┬─".as_bytes()),
            ext: 1,
        }));
        assert!(collector.push(ChannelMsg::ExitStatus { exit_status: 0 }));
        assert!(!collector.push(ChannelMsg::Close));

        let output = collector.finish();
        assert_eq!(output.stdout, "✔ Container web  Started");
        assert_eq!(output.stderr, "─┬─");
        assert!(output.success());
    }

    #[test]
    fn test_collector_without_exit_status() {
        let mut collector = OutputCollector::default();
        assert!(collector.push(data(b"partial")));
        assert!(collector.push(ChannelMsg::Eof));

        let output = collector.finish();
        assert_eq!(output.stdout, "partial");
        assert_eq!(output.exit_code, None);
        assert!(!output.success());
    }
}

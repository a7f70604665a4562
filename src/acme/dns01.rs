//! DNS-01 challenge providers.

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use crate::config::DnsHookConfig;
use crate::errors::{CertKeeperError, Result};

/// Publishes and withdraws `_acme-challenge` TXT records.
#[async_trait]
pub trait Dns01Provider: Send + Sync {
    /// Publish `value` as a TXT record at `fqdn`.
    async fn present(&self, fqdn: &str, value: &str) -> Result<()>;

    /// Remove the TXT record published by `present`.
    async fn cleanup(&self, fqdn: &str, value: &str) -> Result<()>;
}

/// Name of the TXT record that validates `domain`
pub fn challenge_fqdn(domain: &str) -> String {
    let base = domain.strip_prefix("*.").unwrap_or(domain);
    format!("_acme-challenge.{}.", base.trim_end_matches('.'))
}

/// Runs an external program: `<program> <args…> present|cleanup <fqdn> <value>`.
///
/// The record TTL is exported as `CERTKEEPER_DNS_TTL`.
#[derive(Debug, Clone)]
pub struct CommandDns01Provider {
    program: String,
    args: Vec<String>,
    ttl_seconds: u32,
    timeout: Duration,
}

impl CommandDns01Provider {
    pub fn new(config: &DnsHookConfig, ttl_seconds: u32, timeout: Duration) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            ttl_seconds,
            timeout,
        }
    }

    async fn run(&self, action: &str, fqdn: &str, value: &str) -> Result<()> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(action)
            .arg(fqdn)
            .arg(value)
            .env("CERTKEEPER_DNS_TTL", self.ttl_seconds.to_string())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(CertKeeperError::Io {
                    source: e,
                    context: format!("Failed to run DNS hook '{}'", self.program),
                })
            }
            Err(_) => {
                return Err(CertKeeperError::internal(format!(
                    "DNS hook '{}' {} timed out after {:?}",
                    self.program, action, self.timeout
                )))
            }
        };

        if !output.status.success() {
            return Err(CertKeeperError::internal(format!(
                "DNS hook '{}' {} exited with {}: {}",
                self.program,
                action,
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        tracing::debug!(fqdn = %fqdn, action = action, "DNS hook completed");
        Ok(())
    }
}

#[async_trait]
impl Dns01Provider for CommandDns01Provider {
    async fn present(&self, fqdn: &str, value: &str) -> Result<()> {
        self.run("present", fqdn, value).await
    }

    async fn cleanup(&self, fqdn: &str, value: &str) -> Result<()> {
        self.run("cleanup", fqdn, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell_hook(script: String) -> CommandDns01Provider {
        let config = DnsHookConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script, "dns-hook".to_string()],
        };
        CommandDns01Provider::new(&config, 60, Duration::from_secs(5))
    }

    #[test]
    fn test_challenge_fqdn() {
        assert_eq!(challenge_fqdn("example.com"), "_acme-challenge.example.com.");
        assert_eq!(challenge_fqdn("*.example.com"), "_acme-challenge.example.com.");
        assert_eq!(challenge_fqdn("example.com."), "_acme-challenge.example.com.");
    }

    #[tokio::test]
    async fn test_command_hook_receives_action_fqdn_and_value() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("hook.log");
        let provider = shell_hook(format!(
            "echo \"$1 $2 $3 $CERTKEEPER_DNS_TTL\" >> '{}'",
            log.display()
        ));

        provider.present("_acme-challenge.example.com.", "token-value").await.unwrap();
        provider.cleanup("_acme-challenge.example.com.", "token-value").await.unwrap();

        let lines = std::fs::read_to_string(&log).unwrap();
        assert_eq!(
            lines,
            "present _acme-challenge.example.com. token-value 60\n\
             cleanup _acme-challenge.example.com. token-value 60\n"
        );
    }

    #[tokio::test]
    async fn test_command_hook_failure_is_reported() {
        let provider = shell_hook("echo 'zone not found' >&2; exit 3".to_string());
        let err = provider.present("_acme-challenge.example.com.", "v").await.unwrap_err();
        assert!(err.to_string().contains("zone not found"));
    }

    #[tokio::test]
    async fn test_missing_program_is_io_error() {
        let config = DnsHookConfig { program: "/nonexistent/dns-hook".to_string(), args: vec![] };
        let provider = CommandDns01Provider::new(&config, 60, Duration::from_secs(5));
        let err = provider.present("_acme-challenge.example.com.", "v").await.unwrap_err();
        assert!(matches!(err, CertKeeperError::Io { .. }));
    }
}

//! Bearer tokens for the managed engine.

use std::process::Command;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::ChatError;

/// Access tokens from `gcloud` live for an hour; refresh a little early.
const COMMAND_TOKEN_TTL: Duration = Duration::from_secs(50 * 60);

pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Result<String, ChatError>;

    /// Forget any cached token, e.g. after the backend rejected it.
    fn invalidate(&self) {}
}

/// A fixed token supplied by the user.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Result<String, ChatError> {
        if self.0.trim().is_empty() {
            return Err(ChatError::Credentials("access token is empty".to_string()));
        }
        Ok(self.0.trim().to_string())
    }
}

/// Token printed on stdout by an external command, cached for a while.
pub struct CommandToken {
    argv: Vec<String>,
    ttl: Duration,
    cached: Mutex<Option<(String, Instant)>>,
}

impl CommandToken {
    /// `command` is split with shell quoting rules; it is not run through a
    /// shell.
    pub fn new(command: &str) -> Result<Self, ChatError> {
        let argv = shlex::split(command)
            .filter(|argv| !argv.is_empty())
            .ok_or_else(|| ChatError::Credentials(format!("invalid token command: {:?}", command)))?;
        Ok(Self {
            argv,
            ttl: COMMAND_TOKEN_TTL,
            cached: Mutex::new(None),
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn cached(&self) -> Option<String> {
        let guard = self.cached.lock().ok()?;
        match &*guard {
            Some((token, fetched)) if fetched.elapsed() < self.ttl => Some(token.clone()),
            _ => None,
        }
    }

    fn run(&self) -> Result<String, ChatError> {
        let program = &self.argv[0];
        log::debug!("Fetching access token with {}", program);

        let output = Command::new(program)
            .args(&self.argv[1..])
            .output()
            .map_err(|e| ChatError::Credentials(format!("failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            return Err(ChatError::Credentials(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(ChatError::Credentials(format!("{} printed no token", program)));
        }
        Ok(token)
    }
}

impl TokenProvider for CommandToken {
    fn token(&self) -> Result<String, ChatError> {
        if let Some(token) = self.cached() {
            return Ok(token);
        }

        // The lock is not held while the command runs.
        let token = self.run()?;
        if let Ok(mut guard) = self.cached.lock() {
            *guard = Some((token.clone(), Instant::now()));
        }
        Ok(token)
    }

    fn invalidate(&self) {
        if let Ok(mut guard) = self.cached.lock() {
            *guard = None;
        }
    }
}

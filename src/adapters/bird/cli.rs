//! Runs `<binary> mentions --count N --json` as a child process.

use async_trait::async_trait;
use regex::Regex;
use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;

use crate::domain::models::BridgeConfig;
use crate::domain::ports::{MentionFetchError, MentionFetchOutput, MentionFetchRequest, MentionFetcher};

/// Upper bound on the `--version` install check.
pub const DEFAULT_VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Bird CLI configuration.
#[derive(Debug, Clone)]
pub struct BirdCliConfig {
    /// Path to the bird binary
    pub binary_path: String,
    /// Extra arguments inserted before every subcommand, e.g. account selection
    pub extra_args: Vec<String>,
    /// How long `--version` may take before the binary counts as missing
    pub version_timeout: Duration,
}

impl Default for BirdCliConfig {
    fn default() -> Self {
        Self {
            binary_path: "bird".to_string(),
            extra_args: Vec::new(),
            version_timeout: DEFAULT_VERSION_TIMEOUT,
        }
    }
}

impl From<&BridgeConfig> for BirdCliConfig {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            binary_path: config.binary.clone(),
            extra_args: config.extra_args.clone(),
            ..Self::default()
        }
    }
}

/// [`MentionFetcher`] backed by the bird CLI.
#[derive(Debug, Clone)]
pub struct BirdCliFetcher {
    config: BirdCliConfig,
}

impl BirdCliFetcher {
    pub fn new(config: BirdCliConfig) -> Self {
        Self { config }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(&self.config.binary_path);
        command
            .args(&self.config.extra_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

fn rate_limit_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?i)\brate[ -]?limit|\btoo many requests\b|\b(?:http|status|code|error)[\s:=]*429\b").ok()
        })
        .as_ref()
}

fn auth_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(concat!(
                r"(?i)\b(?:unauthori[sz]ed|forbidden|authentication|not authenticated|auth token|credentials?|cookies?)\b",
                r"|\b(?:not logged in|log ?in (?:required|failed|again|expired))\b",
                r"|\b(?:http|status|code|error)[\s:=]*40[13]\b",
                r"|\b40[13] (?:unauthori[sz]ed|forbidden)\b",
            ))
            .ok()
        })
        .as_ref()
}

/// Map a non-zero exit into the fetch error taxonomy by inspecting stderr.
///
/// Status codes only count next to an HTTP/status word, so ids and handles in
/// the message never classify it.
pub fn classify_failure(code: Option<i32>, stderr: &str) -> MentionFetchError {
    let lower = stderr.to_lowercase();
    let snippet = stderr.trim().chars().take(500).collect::<String>();

    if code == Some(127) || lower.contains("command not found") {
        return MentionFetchError::NotInstalled(snippet);
    }
    if rate_limit_pattern().is_some_and(|re| re.is_match(stderr)) {
        return MentionFetchError::RateLimited(snippet);
    }
    if auth_pattern().is_some_and(|re| re.is_match(stderr)) {
        return MentionFetchError::Auth(snippet);
    }
    if lower.contains("--json")
        && (lower.contains("unknown") || lower.contains("unrecognized") || lower.contains("unexpected"))
    {
        return MentionFetchError::StructuredOutputUnsupported;
    }
    MentionFetchError::CommandFailed { code, stderr: snippet }
}

/// Plain text is unstructured; text that opens like JSON but does not parse is malformed.
fn parse_stdout(stdout: &str) -> Result<MentionFetchOutput, MentionFetchError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(MentionFetchOutput::Structured(serde_json::Value::Array(Vec::new())));
    }
    match serde_json::from_str(trimmed) {
        Ok(value) => Ok(MentionFetchOutput::Structured(value)),
        Err(e) if trimmed.starts_with(['[', '{']) => Err(MentionFetchError::MalformedOutput(e.to_string())),
        Err(_) => Ok(MentionFetchOutput::Unstructured(trimmed.to_string())),
    }
}

#[async_trait]
impl MentionFetcher for BirdCliFetcher {
    async fn is_installed(&self) -> bool {
        let timeout = self.config.version_timeout;
        match tokio::time::timeout(timeout, self.command(&["--version"]).output()).await {
            Ok(Ok(out)) => out.status.success(),
            Ok(Err(_)) => false,
            Err(_) => {
                tracing::warn!(binary = %self.config.binary_path, timeout_ms = timeout.as_millis() as u64, "version check timed out; treating as not installed");
                false
            }
        }
    }

    async fn fetch_mentions(
        &self,
        request: MentionFetchRequest,
    ) -> Result<MentionFetchOutput, MentionFetchError> {
        tracing::debug!(binary = %self.config.binary_path, count = request.count, timeout_ms = request.timeout.as_millis() as u64, "fetching mentions");

        let child = self
            .command(&["mentions", "--count", &request.count.to_string(), "--json"])
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => MentionFetchError::NotInstalled(self.config.binary_path.clone()),
                _ => MentionFetchError::Io(e),
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(request.timeout, child.wait_with_output())
            .await
            .map_err(|_| MentionFetchError::Timeout(request.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(output.status.code(), &stderr));
        }

        parse_stdout(&String::from_utf8_lossy(&output.stdout))
    }
}

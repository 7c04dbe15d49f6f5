use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::poll::PollingPolicy;
use crate::util::parse_flag;

pub(crate) const DEFAULT_URL: &str = "https://bigml.io/andromeda/";
pub(crate) const DEV_URL: &str = "https://bigml.io/dev/andromeda/";

/// Everything a client needs to reach the API.
///
/// Each client owns its own copy; nothing is read from process-wide state
/// after construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base API URL, typically `https://bigml.io/andromeda/`.
    pub url: String,
    pub username: String,
    pub api_key: String,
    /// Whether requests target development-mode resources.
    pub dev_mode: bool,
    /// Whether to verify TLS certificates.
    pub verify: bool,
    /// Timeout of each HTTP round trip.
    pub timeout: Duration,
    /// Default dependency wait used by `create`.
    pub policy: PollingPolicy,
}

impl ClientConfig {
    /// Config with explicit credentials and defaults for everything else.
    pub fn new(username: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            username: username.into(),
            api_key: api_key.into(),
            dev_mode: false,
            verify: true,
            timeout: Duration::from_secs(60),
            policy: PollingPolicy::default(),
        }
    }

    /// Equivalent to `ClientConfig::load(None, None, None)`.
    pub fn from_env() -> Result<Self> {
        Self::load(None, None, None)
    }

    /// Resolves configuration in order of precedence:
    /// - explicit arguments
    /// - environment variables `BIGML_USERNAME` / `BIGML_API_KEY` / `BIGML_URL` / `BIGML_DEV_MODE`
    /// - config file from `BIGML_RC`, `./.bigmlrc` or `~/.bigmlrc`
    pub fn load(
        username: Option<String>,
        api_key: Option<String>,
        dev_mode: Option<bool>,
    ) -> Result<Self> {
        resolve(username, api_key, dev_mode, &|k| std::env::var(k).ok())
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        if self.url == DEFAULT_URL || self.url == DEV_URL {
            self.url = default_url(dev_mode).to_string();
        }
        self.dev_mode = dev_mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: PollingPolicy) -> Self {
        self.policy = policy;
        self
    }
}

fn default_url(dev_mode: bool) -> &'static str {
    if dev_mode { DEV_URL } else { DEFAULT_URL }
}

#[derive(Debug, Default)]
struct RcConfig {
    url: Option<String>,
    username: Option<String>,
    api_key: Option<String>,
    dev_mode: Option<bool>,
    verify: Option<bool>,
    timeout: Option<u64>,
    poll_interval_ms: Option<u64>,
    poll_attempts: Option<u32>,
}

impl RcConfig {
    /// Returns false for keys this file format does not know.
    fn assign(&mut self, key: &str, value: &str) -> bool {
        match key {
            "url" => self.url = Some(value.to_string()),
            "username" => self.username = Some(value.to_string()),
            "api_key" | "key" => self.api_key = Some(value.to_string()),
            "dev_mode" => self.dev_mode = parse_flag(value),
            "verify" => self.verify = parse_flag(value),
            "timeout" => self.timeout = value.parse().ok(),
            "poll_interval_ms" => self.poll_interval_ms = value.parse().ok(),
            "poll_attempts" => self.poll_attempts = value.parse().ok(),
            _ => return false,
        }
        true
    }
}

fn resolve(
    username: Option<String>,
    api_key: Option<String>,
    dev_mode: Option<bool>,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<ClientConfig> {
    let mut username = username.or_else(|| env("BIGML_USERNAME"));
    let mut api_key = api_key.or_else(|| env("BIGML_API_KEY"));
    let mut url = env("BIGML_URL");
    let mut dev_mode = dev_mode.or_else(|| env("BIGML_DEV_MODE").as_deref().and_then(parse_flag));

    let rc_candidates = rc_candidates(env);
    let mut file = RcConfig::default();

    for rc_path in &rc_candidates {
        if rc_path.exists() {
            file = read_rc(rc_path).with_context(|| {
                format!("failed to read configuration file {}", rc_path.display())
            })?;
            break;
        }
    }

    username = username.or(file.username);
    api_key = api_key.or(file.api_key);
    url = url.or(file.url);
    dev_mode = dev_mode.or(file.dev_mode);

    let searched = || {
        rc_candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let Some(username) = username else {
        bail!(
            "Missing configuration: username (set BIGML_USERNAME or put `username:` in one of: {})",
            searched()
        );
    };
    let Some(api_key) = api_key else {
        bail!(
            "Missing configuration: api_key (set BIGML_API_KEY or put `api_key:` in one of: {})",
            searched()
        );
    };

    let dev_mode = dev_mode.unwrap_or(false);
    let mut policy = PollingPolicy::default();
    if let Some(ms) = file.poll_interval_ms {
        policy.interval = Duration::from_millis(ms);
    }
    if let Some(n) = file.poll_attempts {
        policy.max_attempts = n;
    }

    Ok(ClientConfig {
        url: url.unwrap_or_else(|| default_url(dev_mode).to_string()),
        username,
        api_key,
        dev_mode,
        verify: file.verify.unwrap_or(true),
        timeout: Duration::from_secs(file.timeout.unwrap_or(60)),
        policy,
    })
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    let mut cfg = RcConfig::default();

    // Support formatting where `api_key:` is on one line and the value is on the next line.
    let mut pending_key: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pk) = pending_key.take() {
            // Continuation value line (no colon)
            if !line.contains(':') {
                cfg.assign(pk, strip_quotes(line));
                continue;
            }
        }

        if let Some((k, v)) = line.split_once(':') {
            let k = k.trim();
            let v = strip_quotes(v.trim());
            if v.is_empty() {
                pending_key = Some(k);
            } else if !cfg.assign(k, v) {
                tracing::debug!(key = k, path = %path.display(), "ignoring unknown configuration entry");
            }
        }
    }

    Ok(cfg)
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates(env: &dyn Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    // 1) BIGML_RC (explicit)
    // 2) ./.bigmlrc
    // 3) ~/.bigmlrc
    if let Some(p) = env("BIGML_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".bigmlrc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".bigmlrc"));
    }
    v
}

// ABOUTME: Minimal OpenSSH client config reader for HostName, Port, User and IdentityFile.
// ABOUTME: Host blocks match with `*`/`?` globs and `!` negation; first value wins.

use super::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Settings for one host after applying every matching block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSettings {
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub identity_files: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
struct Block {
    patterns: Vec<String>,
    settings: Vec<(String, String)>,
}

impl Block {
    fn matches(&self, host: &str) -> bool {
        let mut matched = false;
        for pattern in &self.patterns {
            if let Some(negated) = pattern.strip_prefix('!') {
                if glob_match(negated, host) {
                    return false;
                }
            } else if glob_match(pattern, host) {
                matched = true;
            }
        }
        matched
    }
}

#[derive(Debug, Clone, Default)]
pub struct SshConfig {
    blocks: Vec<Block>,
}

impl SshConfig {
    /// Read a config file. A missing file yields an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).map_err(|reason| Error::SshConfig {
                path: path.to_path_buf(),
                reason,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("SSH config not found at {}", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// `~/.ssh/config`, or empty when unavailable.
    pub fn load_default() -> Self {
        let Some(home) = dirs::home_dir() else {
            return Self::default();
        };
        let path = home.join(".ssh").join("config");
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring SSH config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        // Lines before the first Host apply to every host.
        let mut blocks = vec![Block {
            patterns: vec!["*".to_string()],
            settings: Vec::new(),
        }];

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (keyword, value) = split_keyword(line)
                .ok_or_else(|| format!("line {}: missing value", index + 1))?;
            let keyword = keyword.to_ascii_lowercase();

            match keyword.as_str() {
                "host" => blocks.push(Block {
                    patterns: value.split_whitespace().map(str::to_string).collect(),
                    settings: Vec::new(),
                }),
                // Match criteria are not evaluated; the block never applies.
                "match" => blocks.push(Block {
                    patterns: Vec::new(),
                    settings: Vec::new(),
                }),
                _ => {
                    if let Some(block) = blocks.last_mut() {
                        block.settings.push((keyword, unquote(value).to_string()));
                    }
                }
            }
        }

        Ok(Self { blocks })
    }

    pub fn lookup(&self, host: &str) -> HostSettings {
        let mut settings = HostSettings::default();
        for block in self.blocks.iter().filter(|b| b.matches(host)) {
            for (keyword, value) in &block.settings {
                match keyword.as_str() {
                    "hostname" if settings.hostname.is_none() => {
                        settings.hostname = Some(value.replace("%h", host));
                    }
                    "port" if settings.port.is_none() => match value.parse() {
                        Ok(port) => settings.port = Some(port),
                        Err(_) => tracing::warn!("Ignoring invalid SSH config port: {}", value),
                    },
                    "user" if settings.user.is_none() => settings.user = Some(value.clone()),
                    "identityfile" => settings.identity_files.push(expand_home(value)),
                    _ => {}
                }
            }
        }
        settings
    }
}

fn split_keyword(line: &str) -> Option<(&str, &str)> {
    let split_at = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let (keyword, rest) = line.split_at(split_at);
    let value = rest
        .trim_start()
        .strip_prefix('=')
        .unwrap_or(rest)
        .trim();
    if value.is_empty() {
        None
    } else {
        Some((keyword, value))
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Expand a leading `~/` against the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// OpenSSH pattern match: `*` any run, `?` one character.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi].eq_ignore_ascii_case(&t[ti])) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

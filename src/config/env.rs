// ABOUTME: Variable expansion for configuration documents and `.env` file loading.
// ABOUTME: Supports $VAR, ${VAR}, ${VAR:-default} and ${VAR:?message}.

use crate::error::{Error, Result};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

pub type Variables = BTreeMap<String, String>;

/// Merge variable sources, later layers overriding earlier ones.
pub fn layered<I>(layers: I) -> Variables
where
    I: IntoIterator<Item = Variables>,
{
    layers.into_iter().fold(Variables::new(), |mut merged, layer| {
        merged.extend(layer);
        merged
    })
}

pub fn process_env() -> Variables {
    std::env::vars().collect()
}

/// Read `KEY=VALUE` lines. A missing file yields no variables.
pub fn load_env_file(path: &Path) -> Result<Variables> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Environment file not found: {}", path.display());
            return Ok(Variables::new());
        }
        Err(e) => return Err(Error::Io(e)),
    };

    let mut vars = Variables::new();
    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            tracing::warn!("Invalid line in {}:{}: {}", path.display(), index + 1, line);
            continue;
        };
        vars.insert(key.trim().to_string(), unquote(value.trim()).to_string());
    }

    tracing::debug!("Loaded {} variables from {}", vars.len(), path.display());
    Ok(vars)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Expand variables in one string.
///
/// Unset plain references are left as written.
pub fn expand_str(input: &str, vars: &Variables) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            let Some(end) = braced.find('}') else {
                out.push_str(&rest[pos..]);
                return Ok(out);
            };
            out.push_str(&expand_braced(&braced[..end], vars)?);
            rest = &braced[end + 1..];
            continue;
        }

        let name_len = after
            .char_indices()
            .find(|&(i, c)| !(c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit())))
            .map(|(i, _)| i)
            .unwrap_or(after.len());

        if name_len == 0 {
            out.push('$');
            rest = after;
            continue;
        }

        let name = &after[..name_len];
        match vars.get(name) {
            Some(value) => out.push_str(value),
            None => {
                out.push('$');
                out.push_str(name);
            }
        }
        rest = &after[name_len..];
    }

    out.push_str(rest);
    Ok(out)
}

fn expand_braced(expr: &str, vars: &Variables) -> Result<String> {
    if let Some((name, default)) = expr.split_once(":-") {
        return Ok(vars
            .get(name.trim())
            .cloned()
            .unwrap_or_else(|| default.to_string()));
    }
    if let Some((name, message)) = expr.split_once(":?") {
        let name = name.trim();
        return vars.get(name).cloned().ok_or_else(|| Error::MissingEnvVar {
            name: name.to_string(),
            message: message.to_string(),
        });
    }
    Ok(vars
        .get(expr)
        .cloned()
        .unwrap_or_else(|| format!("${{{}}}", expr)))
}

/// Expand every string value in a YAML document in place. Keys are untouched.
pub fn expand_document(value: &mut Value, vars: &Variables) -> Result<()> {
    match value {
        Value::String(s) => *s = expand_str(s, vars)?,
        Value::Sequence(items) => {
            for item in items {
                expand_document(item, vars)?;
            }
        }
        Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                expand_document(item, vars)?;
            }
        }
        Value::Tagged(tagged) => expand_document(&mut tagged.value, vars)?,
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}

//! Utility functions for gradlab
//!
//! Numeric helpers shared by the optimizer and RL crates, and env-file loading.

use std::path::PathBuf;

use crate::error::Result;

/// Discounted return of an episode: `sum(reward[i] * gamma^i)`
///
/// # Example
/// ```
/// use gradlab_core::util::discounted_sum;
///
/// assert_eq!(discounted_sum(&[1.0, 1.0, 1.0], 0.5), 1.75);
/// assert_eq!(discounted_sum(&[], 0.9), 0.0);
/// ```
pub fn discounted_sum(rewards: &[f64], gamma: f64) -> f64 {
    let mut discount = 1.0;
    let mut total = 0.0;
    for reward in rewards {
        total += reward * discount;
        discount *= gamma;
    }
    total
}

/// Running mean: `out[i] = mean(values[..=i])`
///
/// # Example
/// ```
/// use gradlab_core::util::cummean;
///
/// assert_eq!(cummean(&[1.0, 3.0, 5.0]), vec![1.0, 2.0, 3.0]);
/// ```
pub fn cummean(values: &[f64]) -> Vec<f64> {
    let mut sum = 0.0;
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            sum += v;
            sum / (i + 1) as f64
        })
        .collect()
}

/// Index of the first maximum. Empty input yields 0.
///
/// NaN entries never win a comparison, so they are skipped unless every entry is NaN.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] || (values[best].is_nan() && !v.is_nan()) {
            best = i;
        }
    }
    best
}

/// Name of the optional file holding `GRADLAB__*` overrides
pub const ENV_FILE_NAME: &str = "gradlab.env";

/// An env file that was found and applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvFile {
    pub path: PathBuf,
    /// Keys that were set from the file; keys already in the environment are not listed
    pub applied: Vec<String>,
}

/// Where [`load_env_file`] looks, in order: the working directory, the
/// platform config directory, then `~/.config/gradlab`
pub fn env_file_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(ENV_FILE_NAME)];
    candidates.extend(dirs::config_dir().map(|p| p.join("gradlab").join(ENV_FILE_NAME)));
    candidates.extend(dirs::home_dir().map(|p| p.join(".config").join("gradlab").join(ENV_FILE_NAME)));
    candidates.dedup();
    candidates
}

/// Apply the first existing env file from [`env_file_candidates`].
///
/// Runs before logging is configured, so it reports what it did instead of
/// logging it.
pub fn load_env_file() -> Result<Option<EnvFile>> {
    load_env_file_from(&env_file_candidates())
}

/// Apply the first of `candidates` that exists; later candidates are ignored
pub fn load_env_file_from(candidates: &[PathBuf]) -> Result<Option<EnvFile>> {
    let Some(path) = candidates.iter().find(|p| p.is_file()) else {
        return Ok(None);
    };
    let contents = std::fs::read_to_string(path)?;
    Ok(Some(EnvFile {
        path: path.clone(),
        applied: apply_env_vars(parse_env_file(&contents)),
    }))
}

/// Parse `KEY=value` lines into pairs without touching the environment.
///
/// Blank lines and `#` comments are skipped, an `export ` prefix is allowed,
/// and one layer of matching single or double quotes is stripped from values.
/// Lines without `=` or with an empty key are ignored.
pub fn parse_env_file(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
            return inner;
        }
    }
    value
}

/// Set each variable that is not already present; returns the keys that were set
pub fn apply_env_vars(vars: Vec<(String, String)>) -> Vec<String> {
    let mut applied = Vec::new();
    for (key, value) in vars {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(&key, value);
            applied.push(key);
        }
    }
    applied
}

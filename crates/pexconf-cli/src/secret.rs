//! Secret reference resolver.
//!
//! The conference PIN in `config.toml` (or `--pin`) can point outside the
//! file:
//!
//! - `pass::path/in/store`: first line of `pass show path/in/store`
//! - `env::VAR_NAME`: the value of `$VAR_NAME`
//! - anything else: used as-is

use std::process::Command;

use thiserror::Error;

/// Why a secret reference could not be resolved.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("environment variable `{0}` is not set")]
    MissingEnv(String),

    #[error("failed to run `pass show {path}`: {source}")]
    PassSpawn {
        path: String,
        source: std::io::Error,
    },

    #[error("`pass show {path}` failed ({status}): {stderr}")]
    PassFailed {
        path: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("`pass show {0}` produced no output")]
    PassEmpty(String),
}

/// Resolves a value that may be a secret reference.
pub fn resolve(value: &str) -> Result<String, SecretError> {
    if let Some(path) = value.strip_prefix("pass::") {
        resolve_pass(path)
    } else if let Some(var) = value.strip_prefix("env::") {
        std::env::var(var).map_err(|_| SecretError::MissingEnv(var.to_string()))
    } else {
        Ok(value.to_string())
    }
}

fn resolve_pass(path: &str) -> Result<String, SecretError> {
    let output = Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|source| SecretError::PassSpawn {
            path: path.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(SecretError::PassFailed {
            path: path.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| SecretError::PassEmpty(path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_pass_through() {
        assert_eq!(resolve("1234").unwrap(), "1234");
        assert_eq!(resolve("").unwrap(), "");
    }

    #[test]
    fn env_reference() {
        unsafe {
            std::env::set_var("_PEXCONF_TEST_PIN", "4321");
        }
        assert_eq!(resolve("env::_PEXCONF_TEST_PIN").unwrap(), "4321");
        unsafe {
            std::env::remove_var("_PEXCONF_TEST_PIN");
        }
    }

    #[test]
    fn missing_env_reference() {
        let error = resolve("env::_PEXCONF_UNSET_VAR_98765").unwrap_err();
        assert!(matches!(error, SecretError::MissingEnv(ref var) if var == "_PEXCONF_UNSET_VAR_98765"));
        assert!(error.to_string().contains("not set"));
    }

    #[test]
    fn missing_pass_entry() {
        // Fails whether or not `pass` is installed.
        assert!(resolve("pass::pexconf/does/not/exist/98765").is_err());
    }
}

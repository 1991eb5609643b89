// ABOUTME: Secret values that are either literal or read from the environment.
// ABOUTME: Resolution happens when the run starts, never at parse time.

use crate::error::{Error, Result};
use serde::Deserialize;

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl std::fmt::Debug for EnvValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvValue::Literal(_) => f.write_str("Literal(<redacted>)"),
            EnvValue::FromEnv { var, .. } => f.debug_struct("FromEnv").field("var", var).finish(),
        }
    }
}

impl EnvValue {
    pub fn resolve(&self) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromEnv { var, default } => match std::env::var(var) {
                Ok(val) => Ok(val),
                Err(_) => default
                    .clone()
                    .ok_or_else(|| Error::MissingEnvVar(var.clone())),
            },
        }
    }
}

pub fn resolve_optional(value: Option<&EnvValue>) -> Result<Option<String>> {
    value.map(EnvValue::resolve).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_resolves_to_itself() {
        let value: EnvValue = serde_yaml::from_str("s3cret").unwrap();
        assert_eq!(value.resolve().unwrap(), "s3cret");
    }

    #[test]
    fn env_reference_reads_variable() {
        let value: EnvValue = serde_yaml::from_str("{ env: APPDEPLOY_TEST_PW }").unwrap();
        temp_env::with_var("APPDEPLOY_TEST_PW", Some("from-env"), || {
            assert_eq!(value.resolve().unwrap(), "from-env");
        });
    }

    #[test]
    fn env_reference_falls_back_to_default() {
        let value: EnvValue =
            serde_yaml::from_str("{ env: APPDEPLOY_TEST_UNSET, default: fallback }").unwrap();
        temp_env::with_var_unset("APPDEPLOY_TEST_UNSET", || {
            assert_eq!(value.resolve().unwrap(), "fallback");
        });
    }

    #[test]
    fn missing_variable_without_default_fails() {
        let value: EnvValue = serde_yaml::from_str("{ env: APPDEPLOY_TEST_MISSING }").unwrap();
        temp_env::with_var_unset("APPDEPLOY_TEST_MISSING", || {
            let err = value.resolve().unwrap_err();
            assert!(matches!(err, Error::MissingEnvVar(ref v) if v == "APPDEPLOY_TEST_MISSING"));
        });
    }

    #[test]
    fn debug_never_shows_literal() {
        let value = EnvValue::Literal("hunter2".into());
        assert!(!format!("{value:?}").contains("hunter2"));
    }

    #[test]
    fn optional_none_stays_none() {
        assert_eq!(resolve_optional(None).unwrap(), None);
    }
}

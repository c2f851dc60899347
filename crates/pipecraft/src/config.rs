//! Configuration for pipeline compilation

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Options controlling how a pipeline compiles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    /// Run a topological sort on the finished graph and fail on a cycle
    pub check_acyclic: bool,
    /// Fail on Seq/Parallel blocks without children instead of warning
    pub reject_empty: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            check_acyclic: true,
            reject_empty: false,
        }
    }
}

impl CompileOptions {
    /// Parse options from JSON; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Strict options: empty compositions are errors
    pub fn strict() -> Self {
        Self {
            reject_empty: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CompileOptions::default();
        assert!(options.check_acyclic);
        assert!(!options.reject_empty);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = CompileOptions::from_json_str(r#"{"rejectEmpty": true}"#).unwrap();
        assert_eq!(options, CompileOptions::strict());
    }

    #[test]
    fn test_unknown_type_is_error() {
        assert!(CompileOptions::from_json_str(r#"{"checkAcyclic": "yes"}"#).is_err());
    }
}

//! Category taxonomy for statement categorization
//!
//! The taxonomy is loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/tally/config/taxonomy.toml)
//! 2. Fall back to embedded defaults (compiled into binary)

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default taxonomy (compiled into binary)
const DEFAULT_TAXONOMY: &str = include_str!("../../../config/taxonomy.toml");

/// Fixed category lists the AI capability is asked to use
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Taxonomy {
    /// Closed list of income categories
    pub income: Vec<String>,
    /// Expense categories; the AI may coin names outside this list
    pub expenses: Vec<String>,
    /// Catch-all for income that matches nothing else (must be in `income`)
    pub income_fallback: String,
    /// Label of the statement field holding the balance
    pub balance_label: String,
}

impl Taxonomy {
    /// Parse and validate a TOML taxonomy
    pub fn from_toml(content: &str) -> Result<Self> {
        let taxonomy: Taxonomy = toml::from_str(content)
            .map_err(|e| Error::InvalidData(format!("Invalid taxonomy config: {}", e)))?;
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    /// Load from an explicit file, or the override location, or the embedded default
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let override_path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_taxonomy_path().filter(|p| p.exists()),
        };

        match override_path {
            Some(p) => {
                let content = fs::read_to_string(&p).map_err(|e| {
                    Error::Configuration(format!(
                        "Failed to read taxonomy {}: {}",
                        p.display(),
                        e
                    ))
                })?;
                Self::from_toml(&content)
            }
            None => Self::from_toml(DEFAULT_TAXONOMY),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.income.is_empty() || self.expenses.is_empty() {
            return Err(Error::InvalidData(
                "Taxonomy needs at least one income and one expense category".into(),
            ));
        }
        if self
            .income
            .iter()
            .chain(self.expenses.iter())
            .any(|c| c.trim().is_empty())
        {
            return Err(Error::InvalidData(
                "Taxonomy category names must not be empty".into(),
            ));
        }
        if !self.income.contains(&self.income_fallback) {
            return Err(Error::InvalidData(format!(
                "Income fallback '{}' is not one of the income categories",
                self.income_fallback
            )));
        }
        Ok(())
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::from_toml(DEFAULT_TAXONOMY).expect("embedded taxonomy.toml is valid")
    }
}

/// Default taxonomy override path
pub fn default_taxonomy_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("config").join("taxonomy.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_embedded_taxonomy() {
        let taxonomy = Taxonomy::default();
        assert_eq!(taxonomy, Taxonomy::from_toml(DEFAULT_TAXONOMY).unwrap());
        assert_eq!(
            taxonomy.income,
            vec!["Salary", "Freelance", "Investments", "Refunds", "Transfers In", "Other Income"]
        );
        assert_eq!(taxonomy.expenses.len(), 12);
        assert_eq!(taxonomy.balance_label, "Closing Balance");
    }

    #[test]
    fn test_default_taxonomy_parses() {
        let taxonomy = Taxonomy::from_toml(DEFAULT_TAXONOMY).unwrap();
        assert_eq!(taxonomy.income_fallback, "Other Income");
        assert_eq!(taxonomy.balance_label, "Closing Balance");
        assert!(taxonomy.income.contains(&"Salary".to_string()));
        assert!(taxonomy.expenses.contains(&"Groceries".to_string()));
        assert_eq!(Taxonomy::default(), taxonomy);
    }

    #[test]
    fn test_fallback_must_be_income_category() {
        let err = Taxonomy::from_toml(
            r#"
income_fallback = "Misc"
balance_label = "Balance"
income = ["Salary"]
expenses = ["Rent"]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Misc"));
    }

    #[test]
    fn test_empty_side_rejected() {
        let result = Taxonomy::from_toml(
            r#"
income_fallback = "Other"
balance_label = "Balance"
income = ["Other"]
expenses = []
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taxonomy.toml");
        fs::write(
            &path,
            r#"
income_fallback = "Other"
balance_label = "Ending Balance"
income = ["Wages", "Other"]
expenses = ["Rent", "Food"]
"#,
        )
        .unwrap();

        let taxonomy = Taxonomy::load(Some(&path)).unwrap();
        assert_eq!(taxonomy.income, vec!["Wages", "Other"]);
        assert_eq!(taxonomy.balance_label, "Ending Balance");
    }

    #[test]
    fn test_load_missing_file_is_configuration_error() {
        let err = Taxonomy::load(Some(Path::new("/nonexistent/taxonomy.toml"))).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}

//! Repository manifest.
//!
//! The manifest is a small JSON document at the repository root naming the
//! index directories, the stemmer the index was built with and whether
//! document text was stored:
//!
//! ```json
//! { "indexes": ["main"], "stemmer": "krovetz", "store_docs": true }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::StemmerKind;
use crate::error::{QuiverError, Result};
use crate::repository::format::MANIFEST_FILE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryManifest {
    /// Names of the index directories under `index/`.
    pub indexes: Vec<String>,

    /// Stemmer applied at build time; `null` for none.
    #[serde(default)]
    pub stemmer: Option<StemmerKind>,

    /// Whether `collection/documents` holds the parsed document text.
    #[serde(default)]
    pub store_docs: bool,
}

impl RepositoryManifest {
    /// Manifest for a single index.
    pub fn single<S: Into<String>>(index: S, stemmer: Option<StemmerKind>, store_docs: bool) -> Self {
        RepositoryManifest {
            indexes: vec![index.into()],
            stemmer,
            store_docs,
        }
    }

    /// Read `<repository>/manifest`.
    ///
    /// A missing or malformed manifest is a configuration error, not a
    /// storage error: the directory is simply not a repository.
    pub fn load(repository: &Path) -> Result<Self> {
        let path = repository.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            QuiverError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            QuiverError::configuration(format!("malformed manifest {}: {e}", path.display()))
        })
    }

    /// Write the manifest as pretty-printed JSON.
    pub fn save(&self, repository: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(repository.join(MANIFEST_FILE), content)?;
        Ok(())
    }

    /// The one configured index. Zero or several is a configuration error.
    pub fn single_index(&self) -> Result<&str> {
        match self.indexes.as_slice() {
            [index] => Ok(index.as_str()),
            [] => Err(QuiverError::configuration(
                "repository has no index configured",
            )),
            many => Err(QuiverError::configuration(format!(
                "repository has {} indexes configured ({}); exactly one is supported",
                many.len(),
                many.join(", ")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = RepositoryManifest::single("main", Some(StemmerKind::Krovetz), true);
        manifest.save(temp_dir.path()).unwrap();

        let loaded = RepositoryManifest::load(temp_dir.path()).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.single_index().unwrap(), "main");
    }

    #[test]
    fn test_defaults() {
        let manifest: RepositoryManifest = serde_json::from_str(r#"{"indexes": ["a"]}"#).unwrap();
        assert_eq!(manifest.stemmer, None);
        assert!(!manifest.store_docs);

        let manifest: RepositoryManifest =
            serde_json::from_str(r#"{"indexes": ["a"], "stemmer": null}"#).unwrap();
        assert_eq!(manifest.stemmer, None);
    }

    #[test]
    fn test_index_count_must_be_one() {
        let none = RepositoryManifest {
            indexes: vec![],
            stemmer: None,
            store_docs: false,
        };
        assert!(matches!(none.single_index(), Err(QuiverError::Configuration(_))));

        let two = RepositoryManifest {
            indexes: vec!["a".to_string(), "b".to_string()],
            stemmer: None,
            store_docs: false,
        };
        let err = two.single_index().unwrap_err();
        assert!(err.to_string().contains("2 indexes"));
    }

    #[test]
    fn test_missing_and_malformed_manifest() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            RepositoryManifest::load(temp_dir.path()),
            Err(QuiverError::Configuration(_))
        ));

        std::fs::write(temp_dir.path().join(MANIFEST_FILE), "{not json").unwrap();
        assert!(matches!(
            RepositoryManifest::load(temp_dir.path()),
            Err(QuiverError::Configuration(_))
        ));
    }
}

//! Model files.
//!
//! Layout (bincode, fixed-width integers):
//!
//! | Field | Type |
//! |---|---|
//! | magic | `[u8; 8]`, always `IOTIDSRF` |
//! | format version | `u32` |
//! | header | trees, classes, feature names |
//! | forest | [`RandomForest`] |
//!
//! The magic and version are decoded on their own first, so a file from
//! another tool or another format version is reported as such instead of
//! as a decoding failure somewhere inside the forest.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::RfError;
use crate::forest::RandomForest;

const MAGIC: [u8; 8] = *b"IOTIDSRF";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct FileTag {
    magic: [u8; 8],
    format_version: u32,
}

/// Summary stored ahead of the trees, readable without rebuilding them.
#[derive(Debug, Serialize, Deserialize)]
struct ModelHeader {
    n_trees: usize,
    n_classes: usize,
    feature_names: Vec<String>,
}

#[derive(Serialize)]
struct ModelFileRef<'a> {
    tag: FileTag,
    header: ModelHeader,
    forest: &'a RandomForest,
}

#[derive(Deserialize)]
struct ModelFile {
    #[allow(dead_code)]
    tag: FileTag,
    header: ModelHeader,
    forest: RandomForest,
}

impl RandomForest {
    /// Write the forest to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::SerializeModel`] | bincode encoding failed |
    /// | [`RfError::WriteModel`] | file write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RfError> {
        let path = path.as_ref();
        let file = ModelFileRef {
            tag: FileTag {
                magic: MAGIC,
                format_version: FORMAT_VERSION,
            },
            header: ModelHeader {
                n_trees: self.trees.len(),
                n_classes: self.n_classes,
                feature_names: self.feature_names.clone(),
            },
            forest: self,
        };

        let bytes = bincode::serialize(&file).map_err(|source| RfError::SerializeModel { source })?;
        std::fs::write(path, &bytes).map_err(|source| RfError::WriteModel {
            path: path.to_path_buf(),
            source,
        })?;

        info!(size_bytes = bytes.len(), n_trees = self.trees.len(), "model saved");
        Ok(())
    }

    /// Read a forest written by [`RandomForest::save`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::ReadModel`] | file read failed |
    /// | [`RfError::NotAModelFile`] | the file does not start with the model magic |
    /// | [`RfError::IncompatibleModelVersion`] | written by another format version |
    /// | [`RfError::DeserializeModel`] | truncated or corrupt contents |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RfError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| RfError::ReadModel {
            path: path.to_path_buf(),
            source,
        })?;
        let corrupt = |source| RfError::DeserializeModel {
            path: path.to_path_buf(),
            source,
        };

        let tag: FileTag = bincode::deserialize(&bytes).map_err(corrupt)?;
        if tag.magic != MAGIC {
            return Err(RfError::NotAModelFile {
                path: path.to_path_buf(),
            });
        }
        if tag.format_version != FORMAT_VERSION {
            return Err(RfError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: tag.format_version,
                path: path.to_path_buf(),
            });
        }

        let file: ModelFile = bincode::deserialize(&bytes).map_err(corrupt)?;
        debug!(
            n_trees = file.header.n_trees,
            n_classes = file.header.n_classes,
            n_features = file.header.feature_names.len(),
            "model header read"
        );
        Ok(file.forest)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{FORMAT_VERSION, FileTag, MAGIC, ModelFileRef, ModelHeader};
    use crate::config::RandomForestConfig;
    use crate::error::RfError;
    use crate::forest::RandomForest;

    fn small_forest() -> RandomForest {
        let features = vec![
            vec![1.0, 6.0],
            vec![2.0, 6.0],
            vec![3.0, 6.0],
            vec![10.0, 17.0],
            vec![11.0, 17.0],
            vec![12.0, 17.0],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let names = vec!["flow_duration".to_string(), "proto".to_string()];
        RandomForestConfig::new(7)
            .unwrap()
            .fit(&features, &labels, &names)
            .unwrap()
            .into_forest()
    }

    fn write_with_tag(path: &std::path::Path, forest: &RandomForest, magic: [u8; 8], version: u32) {
        let file = ModelFileRef {
            tag: FileTag {
                magic,
                format_version: version,
            },
            header: ModelHeader {
                n_trees: forest.n_trees(),
                n_classes: forest.n_classes(),
                feature_names: forest.feature_names().to_vec(),
            },
            forest,
        };
        std::fs::write(path, bincode::serialize(&file).unwrap()).unwrap();
    }

    #[test]
    fn reload_gives_identical_predictions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run_model.bin");
        let forest = small_forest();
        forest.save(&path).unwrap();
        assert!(std::fs::read(&path).unwrap().starts_with(b"IOTIDSRF"));
        let loaded = RandomForest::load(&path).unwrap();

        assert_eq!(loaded.feature_names(), forest.feature_names());
        for sample in [[1.5, 6.0], [11.0, 17.0], [6.5, 11.0]] {
            assert_eq!(
                forest.predict_with_confidence(&sample).unwrap(),
                loaded.predict_with_confidence(&sample).unwrap()
            );
            assert_eq!(
                forest.predict_proba(&sample).unwrap().as_slice(),
                loaded.predict_proba(&sample).unwrap().as_slice()
            );
        }
    }

    #[test]
    fn missing_file_error() {
        let dir = TempDir::new().unwrap();
        let err = RandomForest::load(dir.path().join("absent.bin")).unwrap_err();
        assert!(matches!(err, RfError::ReadModel { .. }));
    }

    #[test]
    fn foreign_file_rejected_by_magic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("traffic.csv");
        std::fs::write(&path, b"id,proto,service,Attack_type\n").unwrap();
        assert!(matches!(
            RandomForest::load(&path).unwrap_err(),
            RfError::NotAModelFile { .. }
        ));
    }

    #[test]
    fn short_or_truncated_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, b"IOTI").unwrap();
        assert!(matches!(
            RandomForest::load(&path).unwrap_err(),
            RfError::DeserializeModel { .. }
        ));

        let full = dir.path().join("full.bin");
        small_forest().save(&full).unwrap();
        let bytes = std::fs::read(&full).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        assert!(matches!(
            RandomForest::load(&path).unwrap_err(),
            RfError::DeserializeModel { .. }
        ));
    }

    #[test]
    fn version_mismatch_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("future.bin");
        write_with_tag(&path, &small_forest(), MAGIC, FORMAT_VERSION + 1);
        assert!(matches!(
            RandomForest::load(&path).unwrap_err(),
            RfError::IncompatibleModelVersion { found, .. } if found == FORMAT_VERSION + 1
        ));
    }
}

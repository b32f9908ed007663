//! Persistence for YAML documents, fitted objects and numeric arrays
//!
//! Binary files share one envelope: magic bytes, a format version, a kind tag
//! and an FNV-1a checksum over the bincode payload. Loading checks all three.

use crate::error::{NetsecError, Result};
use crate::utils::ensure_parent_dir;
use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Tag stored alongside every serialized payload
pub const KIND_IMPUTER: &str = "knn-imputer";
pub const KIND_BUNDLE: &str = "model-bundle";
pub const KIND_ARRAY: &str = "f64-array";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SerializedObject {
    magic: [u8; 4],
    format_version: u32,
    kind: String,
    payload: Vec<u8>,
    checksum: u64,
}

impl SerializedObject {
    const MAGIC: [u8; 4] = [b'N', b'S', b'P', b'L'];
    const VERSION: u32 = 1;

    fn new(kind: &str, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(&payload);
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            kind: kind.to_string(),
            payload,
            checksum,
        }
    }

    /// FNV-1a over the payload bytes
    fn compute_checksum(data: &[u8]) -> u64 {
        const FNV_OFFSET: u64 = 14695981039346656037;
        const FNV_PRIME: u64 = 1099511628211;

        let mut hash = FNV_OFFSET;
        for byte in data {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }

    fn verify(&self, expected_kind: &str) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(NetsecError::SerializationError("bad magic bytes".to_string()));
        }
        if self.format_version != Self::VERSION {
            return Err(NetsecError::SerializationError(format!(
                "unsupported format version {}",
                self.format_version
            )));
        }
        if self.kind != expected_kind {
            return Err(NetsecError::SerializationError(format!(
                "expected a {} file, found {}",
                expected_kind, self.kind
            )));
        }
        if Self::compute_checksum(&self.payload) != self.checksum {
            return Err(NetsecError::SerializationError(
                "checksum verification failed - file may be corrupted".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serialize `obj` into the envelope at `path`, creating directories as needed.
pub fn save_object<T: Serialize>(path: &Path, kind: &str, obj: &T) -> Result<()> {
    let payload = bincode::serialize(obj)?;
    let envelope = SerializedObject::new(kind, payload);

    ensure_parent_dir(path)?;
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, &envelope)?;
    Ok(())
}

/// Load an object written by [`save_object`].
pub fn load_object<T: DeserializeOwned>(path: &Path, kind: &str) -> Result<T> {
    if !path.exists() {
        return Err(NetsecError::SerializationError(format!(
            "the file {} does not exist",
            path.display()
        )));
    }

    let reader = BufReader::new(File::open(path)?);
    let envelope: SerializedObject = bincode::deserialize_from(reader)?;
    envelope.verify(kind)?;

    Ok(bincode::deserialize(&envelope.payload)?)
}

/// Persist a 2-D numeric array.
pub fn save_array(path: &Path, array: &Array2<f64>) -> Result<()> {
    save_object(path, KIND_ARRAY, array)
}

/// Load a 2-D numeric array written by [`save_array`].
pub fn load_array(path: &Path) -> Result<Array2<f64>> {
    load_object(path, KIND_ARRAY)
}

pub fn read_yaml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| {
        NetsecError::ConfigError(format!("cannot open {}: {}", path.display(), e))
    })?;
    Ok(serde_yaml::from_reader(BufReader::new(file))?)
}

/// Write `content` as YAML, replacing any existing file.
pub fn write_yaml_file<T: Serialize>(path: &Path, content: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let writer = BufWriter::new(File::create(path)?);
    serde_yaml::to_writer(writer, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::collections::BTreeMap;

    #[test]
    fn test_array_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arrays/train.bin");
        let arr = array![[1.0, 2.0, 0.0], [3.0, f64::NAN, 1.0]];

        save_array(&path, &arr).unwrap();
        let loaded = load_array(&path).unwrap();

        assert_eq!(loaded.shape(), arr.shape());
        assert_eq!(loaded[[0, 1]], 2.0);
        assert!(loaded[[1, 1]].is_nan());
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obj.bin");
        save_object(&path, KIND_IMPUTER, &vec![1u32, 2, 3]).unwrap();

        let err = load_object::<Vec<u32>>(&path, KIND_BUNDLE).unwrap_err();
        assert!(matches!(err, NetsecError::SerializationError(_)));
    }

    #[test]
    fn test_corruption_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obj.bin");
        save_object(&path, KIND_IMPUTER, &vec![7u64; 16]).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 9;
        bytes[last] ^= 0xff;
        std::fs::write(&path, bytes).unwrap();

        assert!(load_object::<Vec<u64>>(&path, KIND_IMPUTER).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_object::<Vec<u8>>(Path::new("/nonexistent/obj.bin"), KIND_IMPUTER).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report/report.yaml");
        let mut content = BTreeMap::new();
        content.insert("a".to_string(), 0.5f64);

        write_yaml_file(&path, &content).unwrap();
        let loaded: BTreeMap<String, f64> = read_yaml_file(&path).unwrap();
        assert_eq!(loaded, content);
    }
}

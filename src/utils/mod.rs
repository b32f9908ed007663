//! Utility functions and types

pub mod data_loader;
pub mod persist;

pub use data_loader::{DataLoader, DataSaver, train_test_split, frame_to_array, column_to_vec};
pub use persist::{save_object, load_object, save_array, load_array, read_yaml_file, write_yaml_file};

use std::path::Path;

/// Create the parent directory of `path` if it has one.
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

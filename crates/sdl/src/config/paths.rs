// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Configuration file discovery.

use std::path::{Path, PathBuf};

/// Directories scanned by default, in precedence order (later files
/// override earlier ones for same-keyed content).
pub fn default_conf_directories() -> Vec<PathBuf> {
    vec![PathBuf::from("/etc/sdl.d"), PathBuf::from("/run/sdl.d")]
}

/// All non-hidden `*.json` files below `directories`, sorted
/// lexicographically by full path. Unreadable directories are skipped.
pub fn find_configuration_files(directories: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for directory in directories {
        collect_from_directory(directory, &mut paths);
    }
    paths.sort();
    paths
}

fn collect_from_directory(directory: &Path, paths: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(directory) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with('.') && name.ends_with(".json") {
            paths.push(path);
        }
    }
}

// tests/common/mod.rs

//! Helpers shared by the integration tests

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One archive entry to write
pub enum Item {
    Dir(&'static str),
    File(&'static str, &'static str, u32),
}

fn append_items<W: Write>(builder: &mut tar::Builder<W>, items: &[Item]) {
    for item in items {
        let mut header = tar::Header::new_gnu();
        match item {
            Item::Dir(path) => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_size(0);
                header.set_mode(0o755);
                header.set_cksum();
                builder.append_data(&mut header, path, io::empty()).unwrap();
            }
            Item::File(path, content, mode) => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_size(content.len() as u64);
                header.set_mode(*mode);
                header.set_cksum();
                builder.append_data(&mut header, path, content.as_bytes()).unwrap();
            }
        }
    }
}

/// Write a package archive named `file_name` into `dir`
///
/// A `.tar.gz` name produces a gzip-compressed archive.
pub fn build_package(dir: &Path, file_name: &str, items: &[Item]) -> PathBuf {
    let path = dir.join(file_name);
    let file = File::create(&path).unwrap();

    if file_name.ends_with(".tar.gz") {
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        append_items(&mut builder, items);
        builder.into_inner().unwrap().finish().unwrap();
    } else {
        let mut builder = tar::Builder::new(file);
        append_items(&mut builder, items);
        builder.finish().unwrap();
    }
    path
}

/// Write a plain tar of regular files with names copied verbatim into the header
///
/// `tar::Builder` refuses `..` in paths, so this is the only way to produce
/// an archive that tries to escape its root.
pub fn build_raw_package(dir: &Path, file_name: &str, files: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(file_name);
    let mut builder = tar::Builder::new(File::create(&path).unwrap());

    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        let name = name.as_bytes();
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, content.as_bytes()).unwrap();
    }
    builder.finish().unwrap();
    path
}

/// Every path under `root` with its mode and a SHA-256 of file content
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, String> {
    let mut tree = BTreeMap::new();

    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.unwrap();
        let rel = entry.path().strip_prefix(root).unwrap().to_path_buf();
        let metadata = fs::symlink_metadata(entry.path()).unwrap();
        let mode = metadata.permissions().mode() & 0o7777;

        let value = if metadata.is_dir() {
            format!("dir:{:o}", mode)
        } else {
            let digest = Sha256::digest(fs::read(entry.path()).unwrap());
            format!("file:{:o}:{:x}", mode, digest)
        };
        tree.insert(rel, value);
    }
    tree
}

/// System root, installed index, hook temp dir and package library under one scratch dir
pub struct Layout {
    pub dir: tempfile::TempDir,
    pub root: PathBuf,
    pub index: PathBuf,
    pub hooks: PathBuf,
    pub library: PathBuf,
}

impl Layout {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let index = dir.path().join("installed");
        let hooks = dir.path().join("tmp");
        let library = dir.path().join("pkgs");
        for path in [&root, &index, &hooks, &library] {
            fs::create_dir(path).unwrap();
        }
        Self {
            dir,
            root,
            index,
            hooks,
            library,
        }
    }
}

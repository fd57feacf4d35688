//! Archive extraction for downloaded engine assets.
//!
//! Dispatch is purely on file extension: `.zip` and `.nupkg` go through the
//! ZIP decoder (a NuGet-style package is a ZIP with extra metadata, ignored
//! here), `.tar.gz`/`.tgz` through gzip+tar. Anything else is
//! `UnsupportedFormat`, reported before the destination directory is
//! touched. The destination is removed and recreated on every extraction so
//! a previous failed attempt cannot leave stale files behind.

use crate::error::{CaliperError, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    Zip,
    TarGz,
}

/// Extract an archive into `dest_dir`, returning the extraction root.
pub fn extract(archive_path: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let format = detect_format(archive_path)?;

    if dest_dir.exists() {
        std::fs::remove_dir_all(dest_dir)
            .map_err(|e| CaliperError::io_with_path(e, dest_dir))?;
    }
    std::fs::create_dir_all(dest_dir)
        .map_err(|e| CaliperError::io_with_path(e, dest_dir))?;

    info!(
        "Extracting {} to {}",
        archive_path.display(),
        dest_dir.display()
    );

    match format {
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir)?,
        ArchiveFormat::TarGz => extract_tarball(archive_path, dest_dir)?,
    }

    Ok(dest_dir.to_path_buf())
}

fn detect_format(archive_path: &Path) -> Result<ArchiveFormat> {
    let name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if name.ends_with(".zip") || name.ends_with(".nupkg") {
        Ok(ArchiveFormat::Zip)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Ok(ArchiveFormat::TarGz)
    } else {
        Err(CaliperError::UnsupportedFormat {
            archive: archive_path.to_path_buf(),
        })
    }
}

fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let extract_failed = |message: String| CaliperError::ExtractFailed {
        archive: archive_path.to_path_buf(),
        message,
    };

    let file = File::open(archive_path)
        .map_err(|e| extract_failed(format!("Failed to open archive: {}", e)))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| extract_failed(format!("Invalid zip archive: {}", e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| extract_failed(format!("Failed to read zip entry {}: {}", i, e)))?;

        // enclosed_name rejects entries that would escape the destination.
        let outpath = match entry.enclosed_name() {
            Some(path) => dest_dir.join(path),
            None => {
                debug!("Skipping zip entry with unsafe name: {}", entry.name());
                continue;
            }
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)
                .map_err(|e| extract_failed(format!("Failed to create directory: {}", e)))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    extract_failed(format!("Failed to create parent directory: {}", e))
                })?;
            }
        }

        let mut outfile = File::create(&outpath)
            .map_err(|e| extract_failed(format!("Failed to create file: {}", e)))?;
        std::io::copy(&mut entry, &mut outfile)
            .map_err(|e| extract_failed(format!("Failed to extract file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode)).ok();
            }
        }
    }

    Ok(())
}

fn extract_tarball(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let extract_failed = |message: String| CaliperError::ExtractFailed {
        archive: archive_path.to_path_buf(),
        message,
    };

    let file = File::open(archive_path)
        .map_err(|e| extract_failed(format!("Failed to open archive: {}", e)))?;
    let decoder = flate2::read::GzDecoder::new(BufReader::new(file));
    let mut archive = tar::Archive::new(decoder);

    archive
        .unpack(dest_dir)
        .map_err(|e| extract_failed(format!("Failed to extract tarball: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, contents) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
    }

    fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *contents).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_extract_zip_with_nested_entries() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("engine.zip");
        write_zip(
            &archive,
            &[
                ("lib/libshale.so", b"not really an ELF".as_slice()),
                ("README.md", b"engine".as_slice()),
            ],
        );

        let dest = dir.path().join("out");
        let root = extract(&archive, &dest).unwrap();

        assert_eq!(root, dest);
        assert!(dest.join("lib/libshale.so").is_file());
        assert!(dest.join("README.md").is_file());
    }

    #[test]
    fn test_extract_nupkg_uses_zip_decoder() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("ShaleDB.Engine.4.1.4.nupkg");
        write_zip(
            &archive,
            &[
                ("runtimes/linux-x64/native/libshale.so", b"engine bytes".as_slice()),
                ("ShaleDB.Engine.nuspec", b"<package/>".as_slice()),
            ],
        );

        let dest = dir.path().join("out");
        extract(&archive, &dest).unwrap();

        assert!(dest.join("runtimes/linux-x64/native/libshale.so").is_file());
    }

    #[test]
    fn test_extract_tarball() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("engine.tar.gz");
        write_tar_gz(&archive, &[("libshale.so", b"engine bytes".as_slice())]);

        let dest = dir.path().join("out");
        extract(&archive, &dest).unwrap();

        assert!(dest.join("libshale.so").is_file());
    }

    #[test]
    fn test_destination_is_recreated_fresh() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("engine.zip");
        write_zip(&archive, &[("libshale.so", b"new".as_slice())]);

        let dest = dir.path().join("out");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("stale-from-failed-attempt.so"), b"old").unwrap();

        extract(&archive, &dest).unwrap();

        assert!(dest.join("libshale.so").is_file());
        assert!(!dest.join("stale-from-failed-attempt.so").exists());
    }

    #[test]
    fn test_unsupported_extension_creates_no_output() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("engine.rar");
        std::fs::write(&archive, b"rar bytes").unwrap();

        let dest = dir.path().join("out");
        let err = extract(&archive, &dest).unwrap_err();

        assert!(matches!(err, CaliperError::UnsupportedFormat { .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn test_corrupt_zip_reports_extract_failed() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("engine.zip");
        std::fs::write(&archive, b"definitely not a zip").unwrap();

        let dest = dir.path().join("out");
        let err = extract(&archive, &dest).unwrap_err();

        assert!(matches!(err, CaliperError::ExtractFailed { .. }));
    }
}

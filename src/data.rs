//! FrameNet corpus download and management.
//!
//! This module downloads the FrameNet 1.7 archive published with the NLTK data
//! packages, caches it locally, and extracts the per-frame XML files the database is
//! populated from.

use crate::error::{PieError, Result};
use crate::progress::{ProgressReporter, ProgressUpdate, report_progress};
use directories_next::ProjectDirs;
use futures::StreamExt;
use log::{debug, info};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// FrameNet release being targeted
pub const FRAMENET_VERSION: &str = "1.7";
/// Subdirectory name within user's data directory
pub const PUNID_SUBDIR: &str = "punid";
/// Top-level directory inside the archive
pub const FRAMENET_DIRNAME: &str = "framenet_v17";
const FRAMENET_FILENAME_ZIP: &str = "framenet_v17.zip";
const FRAME_SUBDIR: &str = "frame";
const FRAMENET_DOWNLOAD_URL: &str =
    "https://raw.githubusercontent.com/nltk/nltk_data/gh-pages/packages/corpora/framenet_v17.zip";

/// Gets the project's data directory path.
/// Creates the directory if it doesn't exist.
pub fn get_data_dir() -> Result<PathBuf> {
    let proj_dirs =
        ProjectDirs::from("org", "PunId", PUNID_SUBDIR).ok_or(PieError::DataDirNotFound)?;
    let data_dir = proj_dirs.data_dir().to_path_buf();
    fs::create_dir_all(&data_dir)?;
    Ok(data_dir)
}

/// Directory holding the extracted frame files below `data_dir`.
pub fn frame_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(FRAMENET_DIRNAME).join(FRAME_SUBDIR)
}

/// Lists the `*.xml` frame files in `dir`, sorted by file name.
pub fn list_frame_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "xml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Downloads a file from a URL to a specified path using streaming with progress reporting.
///
/// The body is written to a `.part` file that is removed again if the download fails.
async fn download_file(url: &str, dest_path: &Path, reporter: &ProgressReporter) -> Result<()> {
    let stage_desc = "Downloading FrameNet data".to_string();
    info!("Downloading data from {} to {:?} (streaming)...", url, dest_path);

    let response = reqwest::get(url).await?.error_for_status()?;
    let total_size = response.content_length();
    report_progress(
        reporter,
        ProgressUpdate::new(stage_desc.clone(), 0, total_size, None),
    );

    let part_path = dest_path.with_extension("zip.part");
    let part_guard = scopeguard::guard(part_path.clone(), |path| {
        let _ = fs::remove_file(path);
    });

    let mut dest_file = BufWriter::new(File::create(&part_path)?);
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result?;
        dest_file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        report_progress(
            reporter,
            ProgressUpdate::new(stage_desc.clone(), downloaded, total_size, None),
        );
    }
    dest_file.flush()?;
    drop(dest_file);

    fs::rename(&part_path, dest_path)?;
    // Renamed into place; nothing left for the guard to clean up.
    let _ = scopeguard::ScopeGuard::into_inner(part_guard);

    report_progress(
        reporter,
        ProgressUpdate::new(
            stage_desc,
            total_size.unwrap_or(downloaded),
            total_size,
            Some("Download complete.".to_string()),
        ),
    );
    info!("Download complete.");
    Ok(())
}

/// Extracts `framenet_v17/frame/*.xml` from the archive into `data_dir`.
///
/// Files are staged in a temporary directory next to the destination and moved into
/// place once every entry has been written, so an interrupted extraction never leaves a
/// half-populated frame directory behind.
async fn extract_frames(
    zip_path: &Path,
    data_dir: &Path,
    reporter: &ProgressReporter,
) -> Result<PathBuf> {
    let stage_desc = "Extracting FrameNet frames".to_string();
    info!("Extracting frame files from {:?}...", zip_path);
    report_progress(reporter, ProgressUpdate::new_stage(stage_desc.clone(), None));

    let zip_path = zip_path.to_path_buf();
    let data_dir = data_dir.to_path_buf();
    let target = frame_dir(&data_dir);
    let target_out = target.clone();

    let extracted = tokio::task::spawn_blocking(move || -> Result<u64> {
        let mut archive = zip::ZipArchive::new(BufReader::new(File::open(&zip_path)?))?;
        let staging = tempfile::tempdir_in(&data_dir)?;
        let mut count = 0u64;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let Some(path) = entry.enclosed_name() else {
                continue;
            };
            let mut components = path.iter();
            let in_frame_dir = components.next().is_some_and(|c| c == FRAMENET_DIRNAME)
                && components.next().is_some_and(|c| c == FRAME_SUBDIR);
            let file_name = match (components.next(), components.next()) {
                (Some(name), None) if in_frame_dir => name.to_owned(),
                _ => continue,
            };
            if Path::new(&file_name).extension().is_none_or(|ext| ext != "xml") {
                continue;
            }

            let mut out = BufWriter::new(File::create(staging.path().join(&file_name))?);
            io::copy(&mut entry, &mut out)?;
            out.flush()?;
            count += 1;
        }

        if count == 0 {
            return Err(PieError::DataFileNotFound(format!(
                "{}/{}/*.xml in {:?}",
                FRAMENET_DIRNAME, FRAME_SUBDIR, zip_path
            )));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        if target.exists() {
            fs::remove_dir_all(&target)?;
        }
        fs::rename(staging.keep(), &target)?;
        Ok(count)
    })
    .await??;

    report_progress(
        reporter,
        ProgressUpdate::new(
            stage_desc,
            extracted,
            Some(extracted),
            Some("Extraction complete.".to_string()),
        ),
    );
    info!("Extracted {} frame files.", extracted);
    Ok(target_out)
}

/// Ensures the FrameNet frame files are present and returns the directory holding them.
///
/// `data_dir` overrides the default per-user data directory. An existing NLTK data
/// checkout (`.../corpora`) can be used directly since it has the same layout.
pub async fn ensure_data(data_dir: Option<&Path>, reporter: &ProgressReporter) -> Result<PathBuf> {
    let data_dir = match data_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            dir.to_path_buf()
        }
        None => get_data_dir()?,
    };
    let frames = frame_dir(&data_dir);
    let zip_path = data_dir.join(FRAMENET_FILENAME_ZIP);

    if frames.is_dir() && !list_frame_files(&frames)?.is_empty() {
        info!("Found existing FrameNet frame directory: {:?}", frames);
        return Ok(frames);
    }
    debug!("FrameNet frame directory not found at {:?}.", frames);

    if !zip_path.exists() {
        info!("FrameNet archive not found at {:?}. Downloading...", zip_path);
        download_file(FRAMENET_DOWNLOAD_URL, &zip_path, reporter).await?;
    } else {
        info!("Found existing FrameNet archive: {:?}", zip_path);
    }

    extract_frames(&zip_path, &data_dir, reporter).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::reporter;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    // Helper to create a small archive with the NLTK layout
    fn create_dummy_zip(path: &Path, entries: &[(&str, &str)]) -> Result<()> {
        let mut writer = zip::ZipWriter::new(File::create(path)?);
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default())?;
            writer.write_all(content.as_bytes())?;
        }
        writer.finish()?;
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_data_extracts_existing_archive() {
        let _ = env_logger::builder().is_test(true).try_init();
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let zip_path = temp_dir.path().join(FRAMENET_FILENAME_ZIP);
        create_dummy_zip(
            &zip_path,
            &[
                ("framenet_v17/frame/Motion.xml", "<frame name=\"Motion\" ID=\"1\"/>"),
                ("framenet_v17/frame/frame.xsl", "<xsl/>"),
                ("framenet_v17/frameIndex.xml", "<frameIndex/>"),
                ("framenet_v17/lu/lu1.xml", "<lexUnit/>"),
            ],
        )
        .unwrap();

        let dir = ensure_data(Some(temp_dir.path()), &reporter(None))
            .await
            .expect("extraction should succeed");
        assert_eq!(dir, frame_dir(temp_dir.path()));

        let files = list_frame_files(&dir).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("Motion.xml"));
    }

    #[tokio::test]
    async fn test_ensure_data_prefers_extracted_frames() {
        let temp_dir = tempdir().unwrap();
        let frames = frame_dir(temp_dir.path());
        fs::create_dir_all(&frames).unwrap();
        fs::write(frames.join("Motion.xml"), "<frame/>").unwrap();

        // No archive present: must not attempt a download.
        let dir = ensure_data(Some(temp_dir.path()), &reporter(None)).await.unwrap();
        assert_eq!(dir, frames);
    }

    #[tokio::test]
    async fn test_extract_rejects_archive_without_frames() {
        let temp_dir = tempdir().unwrap();
        let zip_path = temp_dir.path().join(FRAMENET_FILENAME_ZIP);
        create_dummy_zip(&zip_path, &[("other/readme.txt", "nothing here")]).unwrap();

        let result = extract_frames(&zip_path, temp_dir.path(), &reporter(None)).await;
        assert!(matches!(result, Err(PieError::DataFileNotFound(_))));
        assert!(!frame_dir(temp_dir.path()).exists());
    }
}

// CleanLog - core/dedup.rs
//
// File dedup engine: index every file under the scan roots, fingerprint
// the content, group identical fingerprints, and recommend which copy of
// each group to keep.
//
// Indexing reads metadata only; fingerprinting reads content in fixed
// chunks (or through a memory map for very large files) on the rayon pool.
// Per-file failures are never fatal: they become warnings and the file is
// left unhashed, which excludes it from duplicate detection.

use crate::core::model::{DuplicateGroup, FileRecord, Recommendation, Table};
use crate::core::report::{gigabytes, round2, thousands, ModuleKind, StandardReport};
use crate::util::constants;
use crate::util::error::ScanError;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a dedup scan.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Maximum directory recursion depth.
    pub max_depth: usize,

    /// Glob patterns matched against file names and directory names.
    /// Matching files are skipped; matching directories are not descended into.
    pub exclude_patterns: Vec<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            max_depth: constants::DEFAULT_MAX_DEPTH,
            exclude_patterns: Vec::new(),
        }
    }
}

// =============================================================================
// Indexing
// =============================================================================

/// Walk every existing root and index all regular files.
///
/// Missing roots and inaccessible entries are reported in the returned
/// warnings and skipped.
pub fn scan_and_index(roots: &[PathBuf], config: &DedupConfig) -> (Vec<FileRecord>, Vec<String>) {
    let max_depth = config.max_depth.min(constants::ABSOLUTE_MAX_DEPTH);
    let exclude = compile_patterns(&config.exclude_patterns);

    let mut records = Vec::new();
    let mut warnings = Vec::new();

    for root in roots {
        if !root.exists() {
            let err = ScanError::RootNotFound { path: root.clone() };
            tracing::warn!(error = %err, "Skipping scan root");
            warnings.push(err.to_string());
            continue;
        }

        tracing::debug!(root = %root.display(), max_depth, "Indexing starting");

        let walker = walkdir::WalkDir::new(root)
            .max_depth(max_depth)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !e
                        .file_name()
                        .to_str()
                        .is_some_and(|name| exclude.iter().any(|p| p.matches(name)))
            });

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    let err = ScanError::Traversal { path, source: e };
                    tracing::debug!(warning = %err, "Indexing warning");
                    warnings.push(err.to_string());
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    let err = ScanError::Metadata {
                        path: entry.path().to_path_buf(),
                        source: io::Error::other(e.to_string()),
                    };
                    tracing::debug!(warning = %err, "Indexing warning");
                    warnings.push(err.to_string());
                    continue;
                }
            };

            records.push(FileRecord {
                path: entry.path().to_path_buf(),
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                extension: extension_of(entry.path()),
                hash: None,
            });
        }
    }

    tracing::info!(
        roots = roots.len(),
        files = records.len(),
        warnings = warnings.len(),
        "Indexing complete"
    );

    (records, warnings)
}

fn compile_patterns(patterns: &[String]) -> Vec<glob::Pattern> {
    patterns
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                tracing::warn!(pattern = p, error = %e, "Invalid exclude pattern, skipping");
                None
            }
        })
        .collect()
}

/// Lowercase extension with its leading dot, or "" when there is none.
fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

// =============================================================================
// Fingerprinting
// =============================================================================

/// Fill in the MD5 fingerprint of every record in parallel.
///
/// Unreadable files keep `hash = None`; their errors are returned as warnings.
pub fn calculate_hashes(records: &mut [FileRecord]) -> Vec<String> {
    let warnings: Vec<String> = records
        .par_iter_mut()
        .filter_map(|record| match file_hash(&record.path, record.size) {
            Ok(digest) => {
                record.hash = Some(digest);
                None
            }
            Err(source) => {
                record.hash = None;
                let err = ScanError::Hash {
                    path: record.path.clone(),
                    source,
                };
                tracing::debug!(warning = %err, "Fingerprint warning");
                Some(err.to_string())
            }
        })
        .collect();

    tracing::info!(
        files = records.len(),
        unreadable = warnings.len(),
        "Fingerprinting complete"
    );
    warnings
}

/// Lowercase hex MD5 of a file's content.
pub fn file_hash(path: &Path, size_hint: u64) -> io::Result<String> {
    let file = File::open(path)?;
    let mut hasher = Md5::new();

    if size_hint >= constants::MMAP_HASH_THRESHOLD {
        // SAFETY: the map is read-only and dropped before returning. A file
        // truncated concurrently by another process may fault; dedup scans
        // target user document folders, not live-written logs.
        let map = unsafe { memmap2::Mmap::map(&file)? };
        hasher.update(&map[..]);
    } else {
        let mut reader = file;
        let mut buf = [0u8; constants::HASH_CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
    }

    Ok(hex::encode(hasher.finalize()))
}

// =============================================================================
// Analysis
// =============================================================================

/// Group hashed records by fingerprint, keeping only groups with 2+ members.
/// Groups are ordered by ascending hash; members keep index order.
pub fn duplicate_groups(records: &[FileRecord]) -> Vec<DuplicateGroup> {
    let mut by_hash: BTreeMap<&str, Vec<&FileRecord>> = BTreeMap::new();
    for record in records {
        if let Some(ref hash) = record.hash {
            by_hash.entry(hash.as_str()).or_default().push(record);
        }
    }

    by_hash
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(hash, members)| DuplicateGroup {
            hash: hash.to_string(),
            size: members[0].size,
            paths: members.iter().map(|r| r.path.clone()).collect(),
        })
        .collect()
}

/// Keep the newest member of each of the first groups, delete the rest.
///
/// Members without a known modification time never beat one with a known
/// time; when no member has one, the first path is kept.
pub fn recommend(groups: &[DuplicateGroup], records: &[FileRecord]) -> Vec<Recommendation> {
    let mtimes: BTreeMap<&Path, Option<DateTime<Utc>>> = records
        .iter()
        .map(|r| (r.path.as_path(), r.modified))
        .collect();

    groups
        .iter()
        .take(constants::MAX_RECOMMENDATION_GROUPS)
        .filter_map(|group| {
            let first = group.paths.first()?;
            let mut keep = first;
            let mut best = mtimes.get(first.as_path()).copied().flatten();
            for path in &group.paths[1..] {
                let mtime = mtimes.get(path.as_path()).copied().flatten();
                if mtime > best {
                    keep = path;
                    best = mtime;
                }
            }
            let delete: Vec<PathBuf> = group.paths.iter().filter(|p| *p != keep).cloned().collect();
            if delete.is_empty() {
                return None;
            }
            Some(Recommendation {
                keep: keep.clone(),
                save_space_mb: group.size as f64 * delete.len() as f64 / 1e6,
                delete,
            })
        })
        .collect()
}

/// Build the standard dedup report from fingerprinted records.
pub fn analyze(records: &[FileRecord]) -> StandardReport {
    if records.is_empty() {
        return StandardReport::empty(
            ModuleKind::FileCleaner,
            "No files found, check the scan paths",
            "no_files",
        );
    }

    let total_files = records.len();
    let total_size: u64 = records.iter().map(|r| r.size).sum();

    let groups = duplicate_groups(records);
    let duplicate_files: usize = groups.iter().map(|g| g.paths.len()).sum();
    let savings: f64 = groups
        .iter()
        .map(|g| (g.paths.len() - 1) as f64 * g.size as f64)
        .sum();
    let recommendations = if groups.is_empty() {
        Vec::new()
    } else {
        recommend(&groups, records)
    };
    let savings_ratio = if total_size > 0 {
        savings / total_size as f64 * 100.0
    } else {
        0.0
    };

    let mut report = StandardReport::new(ModuleKind::FileCleaner);
    report
        .discovery("Files scanned", thousands(total_files))
        .discovery(
            "Total size",
            format!("{:.2} GB", gigabytes(total_size as f64)),
        )
        .discovery("Duplicate groups", format!("{} groups", groups.len()))
        .discovery("Duplicate files", format!("{duplicate_files} files"));

    report.cleaning_actions.push(
        "Keep the newest file in each group and delete the other copies".to_string(),
    );
    report.cleaning_actions.push(format!(
        "Top duplicate groups can save about {:.2} GB",
        gigabytes(savings)
    ));
    report.cleaning_actions.extend(
        recommendations
            .iter()
            .take(constants::ACTION_RECOMMENDATIONS)
            .map(|r| {
                format!(
                    "Keep: {}, {} copies can be deleted",
                    r.keep.display(),
                    r.delete.len()
                )
            }),
    );

    report
        .verification("Reclaimable space (GB)", format!("{:.2}", gigabytes(savings)))
        .verification("Savings ratio (%)", format!("{savings_ratio:.1}%"))
        .verification(
            "Estimated files after dedup",
            thousands(total_files - duplicate_files + groups.len()),
        );

    let preview: Vec<&Recommendation> = recommendations
        .iter()
        .take(constants::PREVIEW_RECOMMENDATIONS)
        .collect();
    report.details = serde_json::json!({
        "duplicate_groups": groups.len(),
        "potential_savings_gb": round2(gigabytes(savings)),
        "recommendation_preview": preview,
    });

    let mut table = Table::new(
        ["path", "size", "type", "hash"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    table.rows = records
        .iter()
        .map(|r| {
            vec![
                r.path.display().to_string(),
                r.size.to_string(),
                r.extension.clone(),
                r.hash.clone().unwrap_or_default(),
            ]
        })
        .collect();
    report.table = Some(table);

    let summary = serde_json::json!({
        "total_files": total_files,
        "total_size_gb": round2(gigabytes(total_size as f64)),
        "duplicate_groups": groups.len(),
        "potential_savings_gb": round2(gigabytes(savings)),
        "savings_ratio": round2(savings_ratio),
    });
    report.report_json =
        serde_json::to_string_pretty(&summary).unwrap_or_else(|_| summary.to_string());

    tracing::info!(
        files = total_files,
        groups = groups.len(),
        savings_bytes = savings,
        "Dedup analysis complete"
    );

    report
}

// =============================================================================
// Tests
// =============================================================================

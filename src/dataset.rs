use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, TimeZone};
use image::{GenericImageView, ImageReader};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Legacy date encoding embedded in filenames, interpreted as local time.
const LEGACY_DATE_FORMAT: &str = "%Y_%m_%d__%H_%M_%S";

/// Frames smaller than this on either side are considered corrupt captures.
const MIN_FRAME_DIM: u32 = 10;

/// Three-character capture-source prefix of a frame filename.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CameraId(String);

impl CameraId {
    /// Accepts exactly three ASCII alphanumeric characters.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() == 3 && s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Some(Self(s.to_owned()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One frame's on-disk location plus its canonical timestamp.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    pub path: PathBuf,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    /// `{cam}-{unix_ms}`
    Canonical,
    /// `{cam}_{YYYY_MM_DD}__{HH_MM_SS}`, renamed to canonical on disk
    LegacyDate,
}

#[derive(Debug)]
struct ParsedName {
    camera: CameraId,
    timestamp_ms: i64,
    encoding: Encoding,
}

/// Parse a frame file stem (no extension) into camera + timestamp.
/// Returns `None` for anything that matches neither known format.
fn parse_frame_stem(stem: &str) -> Option<ParsedName> {
    if !stem.is_ascii() || stem.len() < 5 {
        return None;
    }
    let (cam, rest) = stem.split_at(3);
    let camera = CameraId::parse(cam)?;
    match rest.as_bytes()[0] {
        b'-' => {
            let timestamp_ms = rest[1..].parse::<i64>().ok()?;
            Some(ParsedName {
                camera,
                timestamp_ms,
                encoding: Encoding::Canonical,
            })
        }
        b'_' => {
            let dt = NaiveDateTime::parse_from_str(&rest[1..], LEGACY_DATE_FORMAT).ok()?;
            // Ambiguous or nonexistent local times (DST edges) are rejected
            // along with everything else unparsable.
            let timestamp_ms = Local
                .from_local_datetime(&dt)
                .single()?
                .timestamp_millis();
            Some(ParsedName {
                camera,
                timestamp_ms,
                encoding: Encoding::LegacyDate,
            })
        }
        _ => None,
    }
}

/// Why a file was dropped during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CorruptReason {
    Undecodable,
    Undersized,
    BadName,
}

impl fmt::Display for CorruptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CorruptReason::Undecodable => "failed to decode",
            CorruptReason::Undersized => "image too small",
            CorruptReason::BadName => "unrecognized filename format",
        };
        f.write_str(s)
    }
}

/// Per-file outcome: a usable frame, or a corrupt file to be removed.
#[derive(Debug)]
enum Classified {
    Decoded(ParsedName),
    Corrupt(CorruptReason),
}

fn classify_file(path: &Path) -> Classified {
    let decoded = ImageReader::open(path)
        .ok()
        .and_then(|r| r.decode().ok());
    let Some(img) = decoded else {
        return Classified::Corrupt(CorruptReason::Undecodable);
    };
    if img.width() <= MIN_FRAME_DIM || img.height() <= MIN_FRAME_DIM {
        return Classified::Corrupt(CorruptReason::Undersized);
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    match parse_frame_stem(stem) {
        Some(parsed) => Classified::Decoded(parsed),
        None => Classified::Corrupt(CorruptReason::BadName),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NormalizeSummary {
    /// Frames accepted into camera buckets.
    pub frames: usize,
    /// Corrupt or malformed files removed.
    pub corrupt_removed: usize,
    /// Legacy-named files renamed to the canonical format.
    pub renamed: usize,
}

/// Scan a flat dataset directory, group frames by camera and canonicalize
/// timestamps. Corrupt files are deleted; legacy-named files are renamed to
/// `{cam}-{unix_ms}.png` on disk. With `dry_run` no file is touched, but
/// timestamps are still derived so the filters see the same sequences.
///
/// Each returned bucket is sorted ascending by timestamp.
pub fn normalize_dataset(
    dataset_path: &Path,
    dry_run: bool,
) -> Result<(BTreeMap<CameraId, Vec<FrameRecord>>, NormalizeSummary)> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message("Normalizing dataset…");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut buckets: BTreeMap<CameraId, Vec<FrameRecord>> = BTreeMap::new();
    let mut summary = NormalizeSummary::default();

    for entry in WalkDir::new(dataset_path)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_png = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if !is_png {
            continue;
        }

        match classify_file(path) {
            Classified::Corrupt(reason) => {
                spinner.println(format!("⚠️  Removing {:?}: {}", path, reason));
                if !dry_run {
                    fs::remove_file(path)
                        .with_context(|| format!("Failed to delete corrupt file {:?}", path))?;
                }
                summary.corrupt_removed += 1;
            }
            Classified::Decoded(parsed) => {
                let record_path = if parsed.encoding == Encoding::LegacyDate {
                    let canonical = dataset_path
                        .join(format!("{}-{}.png", parsed.camera, parsed.timestamp_ms));
                    if !dry_run {
                        fs::rename(path, &canonical).with_context(|| {
                            format!("Failed to rename {:?} → {:?}", path, canonical)
                        })?;
                    }
                    summary.renamed += 1;
                    if dry_run { path.to_path_buf() } else { canonical }
                } else {
                    path.to_path_buf()
                };

                summary.frames += 1;
                buckets.entry(parsed.camera).or_default().push(FrameRecord {
                    path: record_path,
                    timestamp_ms: parsed.timestamp_ms,
                });
            }
        }
        spinner.tick();
    }

    for records in buckets.values_mut() {
        records.sort_by_key(|r| r.timestamp_ms);
    }

    spinner.finish_with_message(format!(
        "Normalized {} frame(s) across {} camera(s)",
        summary.frames,
        buckets.len()
    ));
    Ok((buckets, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::fs;
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::new(w, h).save(&path).unwrap();
        path
    }

    #[test]
    fn test_camera_id_validation() {
        assert!(CameraId::parse("c10").is_some());
        assert!(CameraId::parse("abc").is_some());
        assert!(CameraId::parse("c1").is_none());
        assert!(CameraId::parse("c100").is_none());
        assert!(CameraId::parse("c-0").is_none());
    }

    #[test]
    fn test_parse_canonical_stem() {
        let parsed = parse_frame_stem("c23-1616742781936").unwrap();
        assert_eq!(parsed.camera.as_str(), "c23");
        assert_eq!(parsed.timestamp_ms, 1616742781936);
        assert_eq!(parsed.encoding, Encoding::Canonical);
    }

    #[test]
    fn test_parse_legacy_stem() {
        let parsed = parse_frame_stem("c21_2021_04_27__11_47_21").unwrap();
        assert_eq!(parsed.camera.as_str(), "c21");
        assert_eq!(parsed.encoding, Encoding::LegacyDate);

        // Must agree with a local-time chrono conversion of the same date.
        let dt = NaiveDateTime::parse_from_str("2021_04_27__11_47_21", LEGACY_DATE_FORMAT).unwrap();
        let expected = Local
            .from_local_datetime(&dt)
            .single()
            .unwrap()
            .timestamp_millis();
        assert_eq!(parsed.timestamp_ms, expected);
    }

    #[test]
    fn test_parse_rejects_malformed_stems() {
        assert!(parse_frame_stem("abc-notanumber").is_none());
        assert!(parse_frame_stem("c23-").is_none());
        assert!(parse_frame_stem("c21_2021_13_45__99_00_00").is_none());
        assert!(parse_frame_stem("c23.1616742781936").is_none());
        assert!(parse_frame_stem("x-1").is_none());
    }

    #[test]
    fn test_corrupt_files_are_removed() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        // Garbage bytes, an undersized frame and a malformed name
        let garbage = dir.join("c10-1000.png");
        fs::write(&garbage, b"not a png at all").unwrap();
        let tiny = write_png(dir, "c10-2000.png", 8, 8);
        let badname = write_png(dir, "abc-notanumber.png", 64, 48);
        let good = write_png(dir, "c10-3000.png", 64, 48);

        let (buckets, summary) = normalize_dataset(dir, false).unwrap();

        assert!(!garbage.exists());
        assert!(!tiny.exists());
        assert!(!badname.exists());
        assert!(good.exists());
        assert_eq!(summary.corrupt_removed, 3);
        assert_eq!(summary.frames, 1);

        let cam = CameraId::parse("c10").unwrap();
        assert_eq!(buckets[&cam].len(), 1);
        assert_eq!(buckets[&cam][0].timestamp_ms, 3000);
    }

    #[test]
    fn test_legacy_names_are_canonicalized() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let old = write_png(dir, "c21_2021_04_27__11_47_21.png", 64, 48);

        let (buckets, summary) = normalize_dataset(dir, false).unwrap();
        assert_eq!(summary.renamed, 1);

        let dt = NaiveDateTime::parse_from_str("2021_04_27__11_47_21", LEGACY_DATE_FORMAT).unwrap();
        let ms = Local
            .from_local_datetime(&dt)
            .single()
            .unwrap()
            .timestamp_millis();
        let canonical = dir.join(format!("c21-{}.png", ms));

        assert!(!old.exists());
        assert!(canonical.exists());

        let cam = CameraId::parse("c21").unwrap();
        assert_eq!(buckets[&cam][0].path, canonical);
        assert_eq!(buckets[&cam][0].timestamp_ms, ms);
    }

    #[test]
    fn test_buckets_sorted_by_timestamp() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        for ts in [5000, 1000, 3000, 2000] {
            write_png(dir, &format!("c10-{}.png", ts), 64, 48);
        }
        write_png(dir, "c11-9000.png", 64, 48);

        let (buckets, _) = normalize_dataset(dir, false).unwrap();
        let cam = CameraId::parse("c10").unwrap();
        let stamps: Vec<i64> = buckets[&cam].iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(stamps, vec![1000, 2000, 3000, 5000]);
        assert_eq!(buckets.len(), 2);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let garbage = dir.join("c10-1000.png");
        fs::write(&garbage, b"junk").unwrap();
        let legacy = write_png(dir, "c21_2021_04_27__11_47_21.png", 64, 48);

        let (buckets, summary) = normalize_dataset(dir, true).unwrap();

        assert!(garbage.exists());
        assert!(legacy.exists());
        assert_eq!(summary.corrupt_removed, 1);
        assert_eq!(summary.renamed, 1);

        // Timestamp still derived; record keeps the on-disk path
        let cam = CameraId::parse("c21").unwrap();
        assert_eq!(buckets[&cam][0].path, legacy);
    }
}

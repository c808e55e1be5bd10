use crate::compare::preprocess;
use crate::config::{CameraParams, ParamsMap};
use crate::dataset::{CameraId, FrameRecord, NormalizeSummary, normalize_dataset};
use crate::filter::{pairwise_pass, sequential_pass};
use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{GrayImage, ImageReader, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;

/// All frames are compared at one fixed resolution so thresholds and mask
/// coordinates mean the same thing for every camera.
const FRAME_WIDTH: u32 = 640;
const FRAME_HEIGHT: u32 = 480;

#[derive(Debug)]
pub struct CameraReport {
    pub camera: CameraId,
    pub loaded: usize,
    pub removed_sequential: usize,
    pub removed_pairwise: usize,
    pub kept: usize,
}

#[derive(Debug)]
pub struct RunSummary {
    pub normalize: NormalizeSummary,
    pub cameras: Vec<CameraReport>,
}

impl RunSummary {
    pub fn removed_duplicates(&self) -> usize {
        self.cameras
            .iter()
            .map(|c| c.removed_sequential + c.removed_pairwise)
            .sum()
    }

    pub fn kept(&self) -> usize {
        self.cameras.iter().map(|c| c.kept).sum()
    }
}

/// Decode every frame of one camera and resize to the fixed resolution.
/// These paths were validated during normalization, so a failure here is a
/// hard error, not data to absorb.
fn load_frames(records: &[FrameRecord]) -> Result<Vec<RgbImage>> {
    let bar = ProgressBar::new(records.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "{bar:40.green} {pos}/{len} {msg}",
    )?);
    bar.set_message("loading frames");

    let mut frames = Vec::with_capacity(records.len());
    for record in records {
        let img = ImageReader::open(&record.path)
            .with_context(|| format!("Failed to open {:?}", record.path))?
            .decode()
            .with_context(|| format!("Failed to decode {:?}", record.path))?
            .resize_exact(FRAME_WIDTH, FRAME_HEIGHT, FilterType::Triangle)
            .to_rgb8();
        frames.push(img);
        bar.inc(1);
    }
    bar.finish_and_clear();
    Ok(frames)
}

/// Run both filter passes for one camera, then commit the decisions: every
/// rejected frame's file is deleted in one final step. Deletion order cannot
/// influence the decisions, which are fully computed beforehand.
fn filter_camera(
    camera: &CameraId,
    records: &[FrameRecord],
    params: &CameraParams,
    dry_run: bool,
) -> Result<CameraReport> {
    let frames = load_frames(records)?;
    let pre: Vec<GrayImage> = frames
        .iter()
        .map(|f| {
            preprocess(
                f,
                &params.gaussian_blur_radius_list,
                params.black_mask.as_ref(),
            )
        })
        .collect();
    drop(frames);

    let seq_keep = sequential_pass(&pre, params);
    let mut survivor_idx = Vec::new();
    let mut survivor_pre = Vec::new();
    for (i, img) in pre.into_iter().enumerate() {
        if seq_keep[i] {
            survivor_idx.push(i);
            survivor_pre.push(img);
        }
    }
    let removed_sequential = records.len() - survivor_idx.len();

    let pair_keep = pairwise_pass(&survivor_pre, params);
    let removed_pairwise = pair_keep.iter().filter(|k| !**k).count();

    let mut keep = vec![false; records.len()];
    for (k, &i) in survivor_idx.iter().enumerate() {
        if pair_keep[k] {
            keep[i] = true;
        }
    }

    for (record, keep) in records.iter().zip(&keep) {
        if *keep {
            continue;
        }
        if dry_run {
            println!("   🗑️  [dry-run] DELETE {}", record.path.display());
        } else {
            fs::remove_file(&record.path)
                .with_context(|| format!("Failed to delete {}", record.path.display()))?;
        }
    }

    Ok(CameraReport {
        camera: camera.clone(),
        loaded: records.len(),
        removed_sequential,
        removed_pairwise,
        kept: keep.iter().filter(|k| **k).count(),
    })
}

/// Normalize the dataset, then filter each camera's sequence in turn.
/// Cameras are independent; one camera's frames are held in memory at a time.
pub fn run(dataset_path: &Path, params: &ParamsMap, dry_run: bool) -> Result<RunSummary> {
    let (buckets, normalize) = normalize_dataset(dataset_path, dry_run)?;

    let mut cameras = Vec::with_capacity(buckets.len());
    for (camera, records) in &buckets {
        let camera_params = params
            .get(camera.as_str())
            .with_context(|| format!("No filter parameters for camera {}", camera))?;

        println!("▶ Filtering {} ({} frames)…", camera, records.len());
        let report = filter_camera(camera, records, camera_params, dry_run)?;
        println!(
            "✅ Finished filtering {} frames: kept {}, removed {} (sequential {}, pairwise {})",
            report.camera,
            report.kept,
            report.removed_sequential + report.removed_pairwise,
            report.removed_sequential,
            report.removed_pairwise,
        );
        cameras.push(report);
    }

    Ok(RunSummary { normalize, cameras })
}

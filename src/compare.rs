use crate::config::MaskRect;
use image::{GrayImage, Luma, RgbImage, imageops};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate;
use imageproc::region_labelling::{Connectivity, connected_components};
use std::collections::HashMap;

/// Per-pixel delta above this counts as changed.
const DELTA_THRESHOLD: u8 = 45;
/// L∞ dilation radius applied to the binary change map, bridging small gaps
/// so one moving object labels as one region.
const DILATE_RADIUS: u8 = 2;

/// Result of comparing two preprocessed frames. Only `score` drives the
/// filters; `regions` and `thresh` are kept for diagnostics.
pub struct FrameDelta {
    /// Total pixel area of changed regions at least `min_contour_area` big.
    /// Higher = more different; 0.0 = near-identical.
    pub score: f64,
    /// Number of regions that passed the area floor.
    pub regions: usize,
    /// Binary change map before dilation.
    pub thresh: GrayImage,
}

/// Grayscale, blur and mask a frame ahead of comparison. Deterministic and
/// pure: the same inputs always produce the same output.
pub fn preprocess(img: &RgbImage, blur_radii: &[f32], mask: Option<&MaskRect>) -> GrayImage {
    let mut gray = imageops::grayscale(img);
    for &sigma in blur_radii {
        if sigma > 0.0 {
            gray = gaussian_blur_f32(&gray, sigma);
        }
    }
    if let Some(m) = mask {
        let (w, h) = gray.dimensions();
        for y in m.top.min(h)..m.bottom.min(h) {
            for x in m.left.min(w)..m.right.min(w) {
                gray.put_pixel(x, y, Luma([0]));
            }
        }
    }
    gray
}

/// Score the visual difference between two equally-sized preprocessed frames:
/// absolute per-pixel delta, binarized, dilated, then 8-connected regions
/// with area below `min_contour_area` discarded as noise.
pub fn compare_frames(a: &GrayImage, b: &GrayImage, min_contour_area: f64) -> FrameDelta {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let (w, h) = a.dimensions();

    let thresh = GrayImage::from_fn(w, h, |x, y| {
        let delta = a.get_pixel(x, y)[0].abs_diff(b.get_pixel(x, y)[0]);
        Luma([if delta > DELTA_THRESHOLD { 255 } else { 0 }])
    });
    let dilated = dilate(&thresh, Norm::LInf, DILATE_RADIUS);
    let labels = connected_components(&dilated, Connectivity::Eight, Luma([0u8]));

    let mut areas: HashMap<u32, u64> = HashMap::new();
    for p in labels.pixels() {
        if p[0] != 0 {
            *areas.entry(p[0]).or_insert(0) += 1;
        }
    }

    let mut score = 0.0;
    let mut regions = 0;
    for &area in areas.values() {
        if area as f64 >= min_contour_area {
            score += area as f64;
            regions += 1;
        }
    }
    FrameDelta { score, regions, thresh }
}

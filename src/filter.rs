use crate::compare::compare_frames;
use crate::config::CameraParams;
use image::GrayImage;

/// Single forward walk over one camera's time-ordered, preprocessed frames.
/// The first frame is always kept; every later frame is scored against the
/// most recently kept frame and dropped when the score is at or below the
/// threshold. O(n) comparisons.
///
/// Returns a keep-mask aligned with the input; no file is touched here.
pub fn sequential_pass(pre: &[GrayImage], params: &CameraParams) -> Vec<bool> {
    let mut keep = vec![false; pre.len()];
    if pre.is_empty() {
        return keep;
    }
    keep[0] = true;
    let mut baseline = 0;
    for i in 1..pre.len() {
        let delta = compare_frames(&pre[baseline], &pre[i], params.min_contour_area);
        if delta.score > params.thresh {
            keep[i] = true;
            baseline = i;
        }
    }
    keep
}

/// All-pairs pass over the sequential survivors, catching repeats separated
/// by intervening distinct frames. The earlier frame of a matching pair is
/// canonical; the later one is marked. A marked frame is frozen: it is never
/// used as a baseline and never re-examined. O(n²) comparisons.
pub fn pairwise_pass(pre: &[GrayImage], params: &CameraParams) -> Vec<bool> {
    let n = pre.len();
    let mut marked = vec![false; n];
    for i in 0..n {
        if marked[i] {
            continue;
        }
        for j in (i + 1)..n {
            if marked[j] {
                continue;
            }
            let delta = compare_frames(&pre[i], &pre[j], params.min_contour_area);
            if delta.score <= params.thresh {
                marked[j] = true;
            }
        }
    }
    marked.into_iter().map(|m| !m).collect()
}

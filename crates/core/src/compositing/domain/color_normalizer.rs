use rayon::prelude::*;

use crate::shared::frame::{Frame, CHANNELS};

/// Per-channel arithmetic means `[r, g, b]` over every pixel of `frame`.
///
/// Returns zeros for an empty frame.
pub fn channel_means(frame: &Frame) -> [f64; 3] {
    let pixels = frame.pixel_count();
    if pixels == 0 {
        return [0.0; 3];
    }

    let sums = frame
        .data()
        .par_chunks(CHANNELS * 4096)
        .map(|chunk| {
            let mut acc = [0u64; 3];
            for px in chunk.chunks_exact(CHANNELS) {
                acc[0] += px[0] as u64;
                acc[1] += px[1] as u64;
                acc[2] += px[2] as u64;
            }
            acc
        })
        .reduce(|| [0u64; 3], |a, b| [a[0] + b[0], a[1] + b[1], a[2] + b[2]]);

    let n = pixels as f64;
    [sums[0] as f64 / n, sums[1] as f64 / n, sums[2] as f64 / n]
}

/// Gray-world scale factors: `gray / mean` per channel, where `gray` is the
/// mean of the three channel means. A channel whose mean is 0 keeps a factor
/// of 1.0.
pub fn gray_world_gains(means: [f64; 3]) -> [f64; 3] {
    let gray = (means[0] + means[1] + means[2]) / 3.0;
    means.map(|m| if m == 0.0 { 1.0 } else { gray / m })
}

/// Rebalances the color channels of `frame` under the gray-world assumption.
///
/// Each channel is scaled by `gray / channel_mean` and clamped to `0..=255`.
/// The input is left untouched; the result has the same dimensions and index.
pub fn normalize_colors(frame: &Frame) -> Frame {
    let gains = gray_world_gains(channel_means(frame));
    let mut out = frame.clone();

    // An already-neutral image has unit gains; skip the pass.
    if gains.iter().all(|&g| g == 1.0) {
        return out;
    }

    out.data_mut()
        .par_chunks_mut(CHANNELS * 4096)
        .for_each(|chunk| {
            for px in chunk.chunks_exact_mut(CHANNELS) {
                for (value, gain) in px.iter_mut().zip(gains) {
                    *value = scale_channel(*value, gain);
                }
            }
        });
    out
}

fn scale_channel(value: u8, gain: f64) -> u8 {
    (value as f64 * gain).round().clamp(0.0, 255.0) as u8
}

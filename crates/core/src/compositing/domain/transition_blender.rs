use rayon::prelude::*;

use crate::shared::frame::Frame;

/// Linear cross-dissolve: `from * (1 - ratio) + to * ratio` per channel,
/// rounded to nearest and clamped to `0..=255`.
///
/// `ratio` is clamped to `0..=1`. Ratio 0 reproduces `from` exactly and
/// ratio 1 reproduces `to` exactly. The result carries `to`'s index.
///
/// Returns `None` when the two canvases differ in size.
pub fn blend_frames(from: &Frame, to: &Frame, ratio: f64) -> Option<Frame> {
    if !from.same_dimensions(to) {
        return None;
    }

    let r = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
    if r == 0.0 {
        return Some(Frame::new(
            from.data().to_vec(),
            from.width(),
            from.height(),
            to.index(),
        ));
    }
    if r == 1.0 {
        return Some(to.clone());
    }

    let inv = 1.0 - r;
    let mut data = vec![0u8; from.data().len()];
    data.par_chunks_mut(64 * 1024)
        .zip(from.data().par_chunks(64 * 1024))
        .zip(to.data().par_chunks(64 * 1024))
        .for_each(|((out, a), b)| {
            for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
                *o = (x as f64 * inv + y as f64 * r).round().clamp(0.0, 255.0) as u8;
            }
        });

    Some(Frame::new(data, from.width(), from.height(), to.index()))
}

/// Blend ratio of transition frame `offset` out of `count`.
///
/// Ratios run `1/count, 2/count, ..., 1.0`: strictly increasing, never 0
/// (that state is the last normal frame) and ending exactly on the next
/// canvas. A single-frame transition has ratio 1.0.
pub fn transition_ratio(offset: usize, count: usize) -> f64 {
    if count == 0 {
        return 1.0;
    }
    let step = (offset + 1).min(count);
    step as f64 / count as f64
}

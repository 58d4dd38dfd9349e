use image::imageops::{self, FilterType};
use ndarray::s;

use crate::shared::frame::Frame;

/// Placement of a scaled source image inside the target canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitGeometry {
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl FitGeometry {
    /// Largest aspect-preserving size that fits `target`, centered.
    ///
    /// Scaled dimensions are rounded to nearest and kept within `1..=target`
    /// so the pasted region never spills outside the canvas.
    pub fn compute(source: (u32, u32), target: (u32, u32)) -> Self {
        let (sw, sh) = source;
        let (tw, th) = target;
        if sw == 0 || sh == 0 || tw == 0 || th == 0 {
            return Self {
                scaled_width: 0,
                scaled_height: 0,
                offset_x: tw / 2,
                offset_y: th / 2,
            };
        }

        let scale = (tw as f64 / sw as f64).min(th as f64 / sh as f64);
        let scaled_width = ((sw as f64 * scale).round() as u32).clamp(1, tw);
        let scaled_height = ((sh as f64 * scale).round() as u32).clamp(1, th);

        Self {
            scaled_width,
            scaled_height,
            offset_x: (tw - scaled_width) / 2,
            offset_y: (th - scaled_height) / 2,
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.offset_x
            && x < self.offset_x + self.scaled_width
            && y >= self.offset_y
            && y < self.offset_y + self.scaled_height
    }
}

/// Scales `source` to fit a `width` x `height` canvas without stretching and
/// pastes it centered over `background`.
///
/// The result always has exactly the target dimensions and carries the
/// source's index.
pub fn fit_to_canvas(source: &Frame, width: u32, height: u32, background: [u8; 3]) -> Frame {
    let mut canvas = Frame::filled(width, height, background, source.index());
    let geometry = FitGeometry::compute((source.width(), source.height()), (width, height));
    if geometry.scaled_width == 0 || geometry.scaled_height == 0 {
        return canvas;
    }

    let scaled = scale_to(source, geometry.scaled_width, geometry.scaled_height);

    let x0 = geometry.offset_x as usize;
    let y0 = geometry.offset_y as usize;
    let w = geometry.scaled_width as usize;
    let h = geometry.scaled_height as usize;
    canvas
        .as_ndarray_mut()
        .slice_mut(s![y0..y0 + h, x0..x0 + w, ..])
        .assign(&scaled.as_ndarray());
    canvas
}

fn scale_to(source: &Frame, width: u32, height: u32) -> Frame {
    if source.width() == width && source.height() == height {
        return source.clone();
    }
    let Some(img) = source.to_rgb_image() else {
        return Frame::filled(width, height, [0, 0, 0], source.index());
    };
    // Triangle = bilinear.
    let resized = imageops::resize(&img, width, height, FilterType::Triangle);
    Frame::from_rgb_image(resized, source.index())
}

use ndarray::{ArrayView3, ArrayViewMut3};

/// Number of interleaved channels in every [`Frame`] (8-bit RGB, no alpha).
pub const CHANNELS: usize = 3;

/// An RGB pixel buffer: contiguous bytes in row-major order.
///
/// The same type carries a decoded source image, a fitted canvas and a
/// blended transition frame. `index` is the position of the source image in
/// the input list; it is not the output frame index, which the sequence
/// synthesizer assigns when the frame is emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    /// A frame with every pixel set to `color`.
    pub fn filled(width: u32, height: u32, color: [u8; 3], index: usize) -> Self {
        let pixels = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixels * CHANNELS);
        for _ in 0..pixels {
            data.extend_from_slice(&color);
        }
        Self::new(data, width, height, index)
    }

    pub fn from_rgb_image(image: image::RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, index)
    }

    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn same_dimensions(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// RGB value at column `x`, row `y`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = ((y as usize) * (self.width as usize) + x as usize) * CHANNELS;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (self.height as usize, self.width as usize, CHANNELS)
    }
}

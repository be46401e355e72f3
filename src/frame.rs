use ndarray::prelude::*;

use crate::bbox::PixelRect;

/// A decoded video frame, RGB, laid out as `rows x cols x 3`.
#[derive(Debug, Clone)]
pub struct Frame {
    /// 1-based position in the source stream
    pub index: u64,
    pub pixels: Array3<u8>,
}

impl Frame {
    pub fn new(index: u64, pixels: Array3<u8>) -> Self {
        Self { index, pixels }
    }

    pub fn filled(index: u64, cols: usize, rows: usize, rgb: [u8; 3]) -> Self {
        let pixels = Array3::from_shape_fn((rows, cols, 3), |(_, _, c)| rgb[c]);
        Self { index, pixels }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.pixels.shape()[0]
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.pixels.shape()[1]
    }

    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.cols(), self.rows())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn region(&self, rect: PixelRect) -> ArrayView3<'_, u8> {
        self.pixels.slice(s![
            rect.y..rect.y + rect.height,
            rect.x..rect.x + rect.width,
            ..
        ])
    }

    pub fn fill_rect(&mut self, rect: PixelRect, rgb: [u8; 3]) {
        let mut view = self.pixels.slice_mut(s![
            rect.y..rect.y + rect.height,
            rect.x..rect.x + rect.width,
            ..
        ]);

        for mut px in view.lanes_mut(Axis(2)) {
            px[0] = rgb[0];
            px[1] = rgb[1];
            px[2] = rgb[2];
        }
    }
}

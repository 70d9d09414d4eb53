//! Planar floating-point image buffers.
//!
//! All intermediate data in the engine lives in these types: row-major f32
//! grids with an aligned row stride so SIMD loops never straddle rows.
//! Images are built once and never mutated after they leave the function
//! that produced them; concurrent reads are therefore always safe.

use rayon::prelude::*;

/// Single-channel floating point image.
#[derive(Debug, Clone)]
pub struct ImageF {
    data: Vec<f32>,
    width: usize,
    height: usize,
    stride: usize,
}

impl ImageF {
    /// Creates a zero-filled image. The stride is rounded up to 16 floats.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        let stride = (width + 15) & !15;
        Self {
            data: vec![0.0; stride * height],
            width,
            height,
            stride,
        }
    }

    /// Creates an image filled with a constant value.
    #[must_use]
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        let stride = (width + 15) & !15;
        Self {
            data: vec![value; stride * height],
            width,
            height,
            stride,
        }
    }

    /// Creates an image from a tightly packed `width * height` buffer.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height`.
    #[must_use]
    pub fn from_vec(data: Vec<f32>, width: usize, height: usize) -> Self {
        assert_eq!(data.len(), width * height);
        Self {
            data,
            width,
            height,
            stride: width,
        }
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixels per row including alignment padding.
    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    #[must_use]
    pub fn row(&self, y: usize) -> &[f32] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        let start = y * self.stride;
        &mut self.data[start..start + self.width]
    }

    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.stride + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.stride + x] = value;
    }

    #[must_use]
    pub fn same_size(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Copies pixel data from an image of identical dimensions.
    ///
    /// # Panics
    /// Panics if dimensions differ.
    pub fn copy_from(&mut self, other: &Self) {
        assert!(self.same_size(other));
        for y in 0..self.height {
            self.row_mut(y).copy_from_slice(other.row(y));
        }
    }

    /// Returns true if every sample is a finite number.
    #[must_use]
    pub fn all_finite(&self) -> bool {
        (0..self.height).all(|y| self.row(y).iter().all(|v| v.is_finite()))
    }

    /// Parallel iterator over `(y, row)` pairs with disjoint mutable rows.
    ///
    /// This is the engine's only fan-out primitive: every parallel stage
    /// writes through it, so work items are always whole rows and never
    /// overlap.
    pub(crate) fn par_rows_mut<'a>(
        &'a mut self,
    ) -> impl IndexedParallelIterator<Item = (usize, &'a mut [f32])> + 'a {
        let width = self.width;
        self.data
            .par_chunks_mut(self.stride)
            .map(move |chunk| &mut chunk[..width])
            .enumerate()
    }
}

/// Accumulates `src` into `dst` element-wise.
pub(crate) fn add_to(dst: &mut ImageF, src: &ImageF) {
    assert!(dst.same_size(src));
    dst.par_rows_mut().for_each(|(y, row)| {
        let s = src.row(y);
        for (d, v) in row.iter_mut().zip(s) {
            *d += *v;
        }
    });
}

/// Three-channel planar image (the X/Y/B planes of the opsin pipeline).
#[derive(Debug, Clone)]
pub struct Image3F {
    planes: [ImageF; 3],
}

impl Image3F {
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            planes: [
                ImageF::new(width, height),
                ImageF::new(width, height),
                ImageF::new(width, height),
            ],
        }
    }

    /// Bundles three planes of identical dimensions.
    ///
    /// # Panics
    /// Panics if the planes disagree on dimensions.
    #[must_use]
    pub fn from_planes(p0: ImageF, p1: ImageF, p2: ImageF) -> Self {
        assert!(p0.same_size(&p1) && p0.same_size(&p2));
        Self {
            planes: [p0, p1, p2],
        }
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.planes[0].width()
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.planes[0].height()
    }

    #[inline]
    #[must_use]
    pub fn plane(&self, c: usize) -> &ImageF {
        &self.planes[c]
    }

    #[inline]
    pub fn plane_mut(&mut self, c: usize) -> &mut ImageF {
        &mut self.planes[c]
    }

    /// Simultaneous mutable access to all three planes.
    #[inline]
    pub(crate) fn planes_mut(&mut self) -> [&mut ImageF; 3] {
        self.planes.each_mut()
    }

    #[must_use]
    pub fn all_finite(&self) -> bool {
        self.planes.iter().all(ImageF::all_finite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_is_aligned() {
        let img = ImageF::new(100, 40);
        assert_eq!(img.width(), 100);
        assert_eq!(img.height(), 40);
        assert_eq!(img.stride() % 16, 0);
        assert!(img.stride() >= img.width());
    }

    #[test]
    fn get_set_roundtrip() {
        let mut img = ImageF::new(10, 10);
        img.set(7, 3, 42.0);
        assert_eq!(img.get(7, 3), 42.0);
        assert_eq!(img.row(3)[7], 42.0);
    }

    #[test]
    fn par_rows_cover_image() {
        let mut img = ImageF::new(33, 17);
        img.par_rows_mut().for_each(|(y, row)| {
            for (x, v) in row.iter_mut().enumerate() {
                *v = (y * 100 + x) as f32;
            }
        });
        assert_eq!(img.get(0, 0), 0.0);
        assert_eq!(img.get(32, 16), 1632.0);
    }

    #[test]
    fn add_to_accumulates() {
        let mut dst = ImageF::filled(8, 8, 1.0);
        let src = ImageF::filled(8, 8, 0.5);
        add_to(&mut dst, &src);
        assert_eq!(dst.get(4, 4), 1.5);
    }

    #[test]
    fn finite_check_catches_nan() {
        let mut img = ImageF::new(8, 8);
        assert!(img.all_finite());
        img.set(2, 2, f32::NAN);
        assert!(!img.all_finite());
    }
}

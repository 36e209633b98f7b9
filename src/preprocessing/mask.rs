/// Binarised sheet: 1 where ink was detected, 0 for blank paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl BinaryMask {
    /// Build a mask from a per-pixel foreground predicate.
    pub fn from_fn<F>(width: u32, height: u32, mut is_ink: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(u8::from(is_ink(x, y)));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Mask with no foreground at all.
    #[cfg(test)]
    pub(crate) fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pixel value (0 or 1). Panics when out of bounds, like `GrayImage::get_pixel`.
    pub fn get(&self, x: u32, y: u32) -> u8 {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        self.data[y as usize * self.width as usize + x as usize]
    }

    #[cfg(test)]
    pub(crate) fn set(&mut self, x: u32, y: u32, ink: bool) {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        self.data[y as usize * self.width as usize + x as usize] = u8::from(ink);
    }

    /// Columns `x_start..x_end` of row `y`.
    pub fn row_span(&self, y: u32, x_start: u32, x_end: u32) -> &[u8] {
        let offset = y as usize * self.width as usize;
        &self.data[offset + x_start as usize..offset + x_end as usize]
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v == 1).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fn_stores_row_major() {
        let mask = BinaryMask::from_fn(4, 2, |x, y| x == 3 && y == 1);
        assert_eq!(mask.get(3, 1), 1);
        assert_eq!(mask.get(1, 1), 0);
        assert_eq!(mask.row_span(1, 2, 4), &[0, 1]);
        assert_eq!(mask.foreground_count(), 1);
    }

    #[test]
    fn test_set_marks_single_pixel() {
        let mut mask = BinaryMask::blank(3, 3);
        mask.set(1, 1, true);
        assert_eq!(mask.foreground_count(), 1);
        assert_eq!(mask.row_span(1, 0, 3), &[0, 1, 0]);
    }
}

//! Terminal sizes in cells and pixels.

/// A terminal size. Pixel dimensions are zero when the host does not report
/// them; consumers must tolerate that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub rows: u32,
    pub cols: u32,
    pub xpixels: u32,
    pub ypixels: u32,
}

impl Size {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            rows,
            cols,
            xpixels: 0,
            ypixels: 0,
        }
    }

    pub fn with_pixels(rows: u32, cols: u32, xpixels: u32, ypixels: u32) -> Self {
        Self {
            rows,
            cols,
            xpixels,
            ypixels,
        }
    }

    /// Shrink by `r` rows, scaling the pixel height proportionally.
    pub fn rows_shrinked(&self, r: u32) -> Size {
        if r >= self.rows {
            return Size {
                rows: 0,
                cols: self.cols,
                xpixels: self.xpixels,
                ypixels: 0,
            };
        }
        Size {
            rows: self.rows - r,
            cols: self.cols,
            xpixels: self.xpixels,
            ypixels: self.ypixels - (r * self.ypixels / self.rows),
        }
    }

    /// Shrink by `c` columns, scaling the pixel width proportionally.
    pub fn cols_shrinked(&self, c: u32) -> Size {
        if c >= self.cols {
            return Size {
                rows: self.rows,
                cols: 0,
                xpixels: 0,
                ypixels: self.ypixels,
            };
        }
        Size {
            rows: self.rows,
            cols: self.cols - c,
            xpixels: self.xpixels - (c * self.xpixels / self.cols),
            ypixels: self.ypixels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shrink_scales_pixels() {
        let size = Size::with_pixels(10, 20, 200, 100);
        assert_eq!(size.rows_shrinked(1), Size::with_pixels(9, 20, 200, 90));
        assert_eq!(size.cols_shrinked(10), Size::with_pixels(10, 10, 100, 100));
    }

    #[test]
    fn shrink_past_zero_clamps() {
        let size = Size::with_pixels(2, 2, 20, 20);
        assert_eq!(size.rows_shrinked(5).rows, 0);
        assert_eq!(size.cols_shrinked(5).cols, 0);
    }
}

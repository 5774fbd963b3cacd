//! Affine pixel-to-world transform

/// Affine coefficients mapping pixel (col, row) to world (x, y):
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// `(col, row) = (0, 0)` is the top-left corner of the top-left pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Usually negative for north-up rasters.
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// North-up transform with no rotation terms.
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// From GDAL order `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`.
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// World coordinates of a fractional pixel position.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// World coordinates of the centre of pixel (col, row).
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Reinterprets a transform anchored on pixel centres (GeoTIFF
    /// PixelIsPoint) as one anchored on the top-left pixel corner.
    pub fn point_to_area(&self) -> Self {
        let (origin_x, origin_y) = self.apply(-0.5, -0.5);
        Self {
            origin_x,
            origin_y,
            ..*self
        }
    }

    fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation
    }

    pub fn is_invertible(&self) -> bool {
        self.determinant().abs() >= 1e-12
    }

    /// Fractional pixel coordinates (col, row) of a world point.
    ///
    /// Returns NaN for both components if the transform is degenerate.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.determinant();
        if det.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;

        (col, row)
    }

    pub fn is_north_up(&self) -> bool {
        self.row_rotation.abs() < 1e-10 && self.col_rotation.abs() < 1e-10 && self.pixel_height < 0.0
    }

    pub fn has_rotation(&self) -> bool {
        self.row_rotation.abs() >= 1e-10 || self.col_rotation.abs() >= 1e-10
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_to_geo_roundtrip() {
        let gt = GeoTransform::new(500_000.0, 4_200_000.0, 1.5, -1.5);

        let (x, y) = gt.pixel_to_geo(12, 40);
        let (col, row) = gt.geo_to_pixel(x, y);

        assert_relative_eq!(col, 12.5, epsilon = 1e-9);
        assert_relative_eq!(row, 40.5, epsilon = 1e-9);
    }

    #[test]
    fn test_rotated_inverse() {
        let gt = GeoTransform::from_gdal([10.0, 2.0, 0.5, 20.0, 0.25, -2.0]);
        let (x, y) = gt.apply(3.25, 7.75);
        let (col, row) = gt.geo_to_pixel(x, y);

        assert_relative_eq!(col, 3.25, epsilon = 1e-9);
        assert_relative_eq!(row, 7.75, epsilon = 1e-9);
        assert!(gt.has_rotation());
        assert!(!gt.is_north_up());
    }

    #[test]
    fn test_point_to_area_moves_half_pixel() {
        let gt = GeoTransform::new(100.0, 200.0, 2.0, -4.0).point_to_area();
        assert_eq!(gt, GeoTransform::new(99.0, 202.0, 2.0, -4.0));

        let rotated = GeoTransform::from_gdal([10.0, 2.0, 1.0, 20.0, 0.5, -2.0]).point_to_area();
        assert_relative_eq!(rotated.origin_x, 10.0 - 1.0 - 0.5, epsilon = 1e-12);
        assert_relative_eq!(rotated.origin_y, 20.0 - 0.25 + 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_transform() {
        let gt = GeoTransform::new(0.0, 0.0, 0.0, -1.0);
        assert!(!gt.is_invertible());
        let (col, row) = gt.geo_to_pixel(1.0, 1.0);
        assert!(col.is_nan() && row.is_nan());
    }

    #[test]
    fn test_gdal_order() {
        let coeffs = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(GeoTransform::from_gdal(coeffs).to_gdal(), coeffs);
    }
}

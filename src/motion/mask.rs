//! Foreground mask post-processing
//!
//! Raster operations applied to a background model's output before the
//! motion decision: exclusion-polygon zeroing, one pass of 3x3
//! morphological opening to suppress speckle noise, and connected-component
//! area measurement.

/// A single-channel mask where nonzero pixels are foreground (255) or
/// shadow (127)
pub struct ForegroundMask {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl ForegroundMask {
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self {
            width: width as usize,
            height: height as usize,
            data,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Count of nonzero pixels (shadow pixels count, matching the original
    /// mask accounting)
    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|&&p| p != 0).count()
    }

    /// Zero every pixel inside `polygon` (even-odd scanline fill).
    /// Polygons with fewer than 3 points are ignored by the caller.
    pub fn zero_polygon(&mut self, polygon: &[[i32; 2]]) {
        if polygon.len() < 3 {
            return;
        }

        let min_y = polygon.iter().map(|p| p[1]).min().unwrap_or(0).max(0);
        let max_y = polygon
            .iter()
            .map(|p| p[1])
            .max()
            .unwrap_or(0)
            .min(self.height as i32 - 1);

        for y in min_y..=max_y {
            let mut crossings: Vec<f64> = Vec::new();
            for i in 0..polygon.len() {
                let [x1, y1] = polygon[i];
                let [x2, y2] = polygon[(i + 1) % polygon.len()];
                if y1 == y2 {
                    continue;
                }
                let (lo, hi) = if y1 < y2 { (y1, y2) } else { (y2, y1) };
                // Half-open rule so shared vertices are counted once
                if y >= lo && y < hi {
                    let t = (y - y1) as f64 / (y2 - y1) as f64;
                    crossings.push(x1 as f64 + t * (x2 - x1) as f64);
                }
            }
            crossings.sort_by(|a, b| a.partial_cmp(b).expect("finite crossings"));

            for pair in crossings.chunks_exact(2) {
                let start = (pair[0].ceil() as i32).max(0);
                let end = (pair[1].floor() as i32).min(self.width as i32 - 1);
                for x in start..=end {
                    self.data[y as usize * self.width + x as usize] = 0;
                }
            }
        }
    }

    /// One pass of morphological opening (erode then dilate) with a 3x3
    /// cross element; removes isolated speckle while keeping solid blobs
    pub fn open(&mut self) {
        let eroded = self.morph(true);
        self.data = eroded;
        let dilated = self.morph(false);
        self.data = dilated;
    }

    fn morph(&self, erode: bool) -> Vec<u8> {
        let mut out = vec![0u8; self.data.len()];
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = y * self.width + x;
                let mut all = true;
                let mut any = false;
                let mut max_val = 0u8;
                for (dx, dy) in [(0i32, 0i32), (-1, 0), (1, 0), (0, -1), (0, 1)] {
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || ny < 0 || nx >= self.width as i32 || ny >= self.height as i32 {
                        all = false;
                        continue;
                    }
                    let v = self.data[ny as usize * self.width + nx as usize];
                    if v != 0 {
                        any = true;
                        max_val = max_val.max(v);
                    } else {
                        all = false;
                    }
                }
                if erode {
                    if all {
                        out[idx] = self.data[idx];
                    }
                } else if any {
                    out[idx] = if self.data[idx] != 0 {
                        self.data[idx]
                    } else {
                        max_val
                    };
                }
            }
        }
        out
    }

    /// Areas of 4-connected nonzero components
    pub fn component_areas(&self) -> Vec<usize> {
        let mut visited = vec![false; self.data.len()];
        let mut areas = Vec::new();
        let mut stack = Vec::new();

        for start in 0..self.data.len() {
            if self.data[start] == 0 || visited[start] {
                continue;
            }
            let mut area = 0usize;
            visited[start] = true;
            stack.push(start);
            while let Some(idx) = stack.pop() {
                area += 1;
                let x = idx % self.width;
                let y = idx / self.width;
                for (dx, dy) in [(-1i32, 0i32), (1, 0), (0, -1), (0, 1)] {
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || ny < 0 || nx >= self.width as i32 || ny >= self.height as i32 {
                        continue;
                    }
                    let nidx = ny as usize * self.width + nx as usize;
                    if self.data[nidx] != 0 && !visited[nidx] {
                        visited[nidx] = true;
                        stack.push(nidx);
                    }
                }
            }
            areas.push(area);
        }
        areas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_with_rect(
        width: u32,
        height: u32,
        x0: usize,
        y0: usize,
        w: usize,
        h: usize,
    ) -> ForegroundMask {
        let mut data = vec![0u8; (width * height) as usize];
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                data[y * width as usize + x] = 255;
            }
        }
        ForegroundMask::from_raw(width, height, data)
    }

    #[test]
    fn polygon_zeroes_interior() {
        let mut mask = mask_with_rect(20, 20, 0, 0, 20, 20);
        mask.zero_polygon(&[[5, 5], [15, 5], [15, 15], [5, 15]]);
        // A point well inside the polygon
        assert_eq!(mask.data()[10 * 20 + 10], 0);
        // A point outside survives
        assert_eq!(mask.data()[2 * 20 + 2], 255);
    }

    #[test]
    fn degenerate_polygon_ignored() {
        let mut mask = mask_with_rect(10, 10, 0, 0, 10, 10);
        mask.zero_polygon(&[[1, 1], [8, 8]]);
        assert_eq!(mask.count_nonzero(), 100);
    }

    #[test]
    fn opening_removes_isolated_pixels() {
        let mut data = vec![0u8; 100];
        data[5 * 10 + 5] = 255;
        let mut mask = ForegroundMask::from_raw(10, 10, data);
        mask.open();
        assert_eq!(mask.count_nonzero(), 0);
    }

    #[test]
    fn opening_keeps_solid_blob() {
        let mut mask = mask_with_rect(30, 30, 5, 5, 10, 10);
        mask.open();
        assert!(mask.count_nonzero() >= 64);
    }

    #[test]
    fn component_areas_separate_blobs() {
        let mut data = vec![0u8; 400];
        // Two disjoint 2x2 blobs
        for (x0, y0) in [(1usize, 1usize), (10, 10)] {
            for y in y0..y0 + 2 {
                for x in x0..x0 + 2 {
                    data[y * 20 + x] = 255;
                }
            }
        }
        let mask = ForegroundMask::from_raw(20, 20, data);
        let mut areas = mask.component_areas();
        areas.sort();
        assert_eq!(areas, vec![4, 4]);
    }
}

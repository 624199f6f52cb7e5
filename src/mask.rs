//! Binary masks and their COCO geometry: area, bbox, RLE and polygons

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use std::collections::{HashMap, HashSet};

use crate::models::Rle;

/// Luma values at or above this count as foreground.
pub const MASK_THRESHOLD: u8 = 128;

/// Row-major 0/1 mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl BinaryMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    /// Build from rows of 0/1 values. Rows must have equal length.
    pub fn from_rows(rows: &[&[u8]]) -> Self {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, |r| r.len()) as u32;
        let mut mask = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), width as usize, "ragged mask rows");
            for (x, &v) in row.iter().enumerate() {
                mask.set(x as u32, y as u32, v != 0);
            }
        }
        mask
    }

    pub fn from_luma(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let data = image
            .pixels()
            .map(|Luma([v])| u8::from(*v >= MASK_THRESHOLD))
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn to_luma(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.get(x, y) { 255 } else { 0 }])
        })
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

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[self.index(x, y)] != 0
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let i = self.index(x, y);
        self.data[i] = u8::from(value);
    }

    /// Nearest-neighbour resize; returns a copy when the size already matches.
    pub fn resized(&self, width: u32, height: u32) -> Self {
        if (width, height) == self.dimensions() {
            return self.clone();
        }
        let resized = imageops::resize(&self.to_luma(), width, height, FilterType::Nearest);
        Self::from_luma(&resized)
    }

    /// Number of foreground pixels.
    pub fn area(&self) -> u64 {
        self.data.iter().filter(|&&v| v != 0).count() as u64
    }

    /// `[x, y, width, height]` of the foreground extent, zeros when empty.
    pub fn bbox(&self) -> [f64; 4] {
        let mut min_x = u32::MAX;
        let mut min_y = u32::MAX;
        let mut max_x = 0;
        let mut max_y = 0;
        let mut any = false;

        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    any = true;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        if !any {
            return [0.0; 4];
        }
        [
            min_x as f64,
            min_y as f64,
            (max_x - min_x + 1) as f64,
            (max_y - min_y + 1) as f64,
        ]
    }

    /// Uncompressed column-major RLE. The first run is always background,
    /// so a mask whose first pixel is set starts with a zero count.
    pub fn to_rle(&self) -> Rle {
        let mut counts = Vec::new();
        let mut current = false;
        let mut run = 0u32;

        for x in 0..self.width {
            for y in 0..self.height {
                let v = self.get(x, y);
                if v != current {
                    counts.push(run);
                    run = 0;
                    current = v;
                }
                run += 1;
            }
        }
        if run > 0 || counts.is_empty() {
            counts.push(run);
        }

        Rle {
            counts,
            size: [self.height, self.width],
        }
    }

    /// Outline polygons as flat `[x0, y0, x1, y1, ...]` lists.
    ///
    /// Contours are traced at the 0.5 iso-level on a zero-padded copy, so
    /// vertices sit halfway between pixel centres. Each contour is closed,
    /// simplified with `tolerance` and dropped if fewer than 3 points remain.
    pub fn polygons(&self, tolerance: f64) -> Vec<Vec<f64>> {
        let mut polygons = Vec::new();

        for mut contour in self.contours() {
            if let Some(&first) = contour.first() {
                contour.push(first);
            }
            let simplified = simplify(&contour, tolerance);
            if simplified.len() < 3 {
                continue;
            }

            let flat = simplified
                .iter()
                .flat_map(|&(row, col)| [col.max(0.0), row.max(0.0)])
                .collect();
            polygons.push(flat);
        }

        polygons
    }

    fn padded(&self, row: i64, col: i64) -> bool {
        row >= 1
            && col >= 1
            && row <= self.height as i64
            && col <= self.width as i64
            && self.get((col - 1) as u32, (row - 1) as u32)
    }

    /// Marching squares over the padded mask. Points are `(row, col)` in
    /// unpadded pixel coordinates. Diagonal foreground neighbours are kept
    /// apart at saddle cells.
    fn contours(&self) -> Vec<Vec<(f64, f64)>> {
        // Edge midpoints in doubled padded coordinates, so they stay integral.
        type Point = (i64, i64);

        let rows = self.height as i64 + 2;
        let cols = self.width as i64 + 2;
        let mut order: Vec<Point> = Vec::new();
        let mut links: HashMap<Point, Vec<Point>> = HashMap::new();
        let mut link = |a: Point, b: Point| {
            for (from, to) in [(a, b), (b, a)] {
                let entry = links.entry(from).or_default();
                if entry.is_empty() {
                    order.push(from);
                }
                entry.push(to);
            }
        };

        for r in 0..rows - 1 {
            for c in 0..cols - 1 {
                let tl = self.padded(r, c);
                let tr = self.padded(r, c + 1);
                let bl = self.padded(r + 1, c);
                let br = self.padded(r + 1, c + 1);

                let top = (2 * r, 2 * c + 1);
                let bottom = (2 * r + 2, 2 * c + 1);
                let left = (2 * r + 1, 2 * c);
                let right = (2 * r + 1, 2 * c + 2);

                let mut crossed = Vec::with_capacity(4);
                if tl != tr {
                    crossed.push(top);
                }
                if tr != br {
                    crossed.push(right);
                }
                if br != bl {
                    crossed.push(bottom);
                }
                if bl != tl {
                    crossed.push(left);
                }

                match crossed.len() {
                    2 => link(crossed[0], crossed[1]),
                    4 if tl => {
                        link(top, left);
                        link(bottom, right);
                    }
                    4 => {
                        link(top, right);
                        link(bottom, left);
                    }
                    _ => {}
                }
            }
        }

        let mut visited: HashSet<Point> = HashSet::new();
        let mut contours = Vec::new();

        for start in order {
            if visited.contains(&start) {
                continue;
            }

            let mut contour = Vec::new();
            let mut prev: Option<Point> = None;
            let mut current = start;
            loop {
                visited.insert(current);
                contour.push((current.0 as f64 / 2.0 - 1.0, current.1 as f64 / 2.0 - 1.0));

                let next = links[&current]
                    .iter()
                    .copied()
                    .find(|&p| Some(p) != prev && !visited.contains(&p));
                match next {
                    Some(p) => {
                        prev = Some(current);
                        current = p;
                    }
                    None => break,
                }
            }
            contours.push(contour);
        }

        contours
    }
}

fn point_segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dr, dc) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dr * dr + dc * dc;
    if len_sq == 0.0 {
        return ((p.0 - a.0).powi(2) + (p.1 - a.1).powi(2)).sqrt();
    }
    let t = (((p.0 - a.0) * dr + (p.1 - a.1) * dc) / len_sq).clamp(0.0, 1.0);
    let (pr, pc) = (a.0 + t * dr, a.1 + t * dc);
    ((p.0 - pr).powi(2) + (p.1 - pc).powi(2)).sqrt()
}

/// Douglas-Peucker simplification keeping both endpoints.
/// A non-positive tolerance returns the input unchanged.
pub fn simplify(points: &[(f64, f64)], tolerance: f64) -> Vec<(f64, f64)> {
    if tolerance <= 0.0 || points.len() < 3 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }

        let (split, max_dist) = (start + 1..end)
            .map(|i| (i, point_segment_distance(points[i], points[start], points[end])))
            .fold((start, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });

        if max_dist > tolerance {
            keep[split] = true;
            stack.push((split, end));
            stack.push((start, split));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> BinaryMask {
        BinaryMask::from_rows(&[
            &[0, 0, 0, 0, 0],
            &[0, 1, 1, 1, 0],
            &[0, 1, 1, 1, 0],
            &[0, 1, 1, 1, 0],
            &[0, 0, 0, 0, 0],
        ])
    }

    #[test]
    fn test_area_and_bbox() {
        let mask = square();
        assert_eq!(mask.area(), 9);
        assert_eq!(mask.bbox(), [1.0, 1.0, 3.0, 3.0]);
        assert_eq!(BinaryMask::new(4, 4).bbox(), [0.0; 4]);
    }

    #[test]
    fn test_rle_column_major() {
        let mask = BinaryMask::from_rows(&[&[1, 0], &[1, 1]]);
        let rle = mask.to_rle();
        // Column 0: 1,1  Column 1: 0,1
        assert_eq!(rle.counts, vec![0, 2, 1, 1]);
        assert_eq!(rle.size, [2, 2]);

        let empty = BinaryMask::new(2, 3).to_rle();
        assert_eq!(empty.counts, vec![6]);
        assert_eq!(empty.size, [3, 2]);
    }

    #[test]
    fn test_single_square_polygon() {
        let polygons = square().polygons(0.0);
        assert_eq!(polygons.len(), 1);

        let poly = &polygons[0];
        // 12 boundary crossings plus the closing point
        assert_eq!(poly.len(), 13 * 2);
        assert_eq!(poly[0..2], poly[poly.len() - 2..]);

        let xs: Vec<f64> = poly.iter().step_by(2).copied().collect();
        let ys: Vec<f64> = poly.iter().skip(1).step_by(2).copied().collect();
        assert_eq!(xs.iter().cloned().fold(f64::MAX, f64::min), 0.5);
        assert_eq!(xs.iter().cloned().fold(f64::MIN, f64::max), 3.5);
        assert_eq!(ys.iter().cloned().fold(f64::MAX, f64::min), 0.5);
        assert_eq!(ys.iter().cloned().fold(f64::MIN, f64::max), 3.5);
    }

    #[test]
    fn test_simplification_reduces_points() {
        let full = square().polygons(0.0);
        let simple = square().polygons(1.0);
        assert_eq!(simple.len(), 1);
        assert!(simple[0].len() < full[0].len());
        assert!(simple[0].len() >= 6);
    }

    #[test]
    fn test_edge_pixels_clamped() {
        let mask = BinaryMask::from_rows(&[&[1, 1], &[1, 1]]);
        let polygons = mask.polygons(0.0);
        assert_eq!(polygons.len(), 1);
        assert!(polygons[0].iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_diagonal_pixels_are_separate() {
        let mask = BinaryMask::from_rows(&[
            &[1, 0, 0],
            &[0, 1, 0],
            &[0, 0, 0],
        ]);
        assert_eq!(mask.polygons(0.0).len(), 2);
    }

    #[test]
    fn test_empty_mask_has_no_polygons() {
        assert!(BinaryMask::new(3, 3).polygons(2.0).is_empty());
    }

    #[test]
    fn test_resize_nearest() {
        let mask = BinaryMask::from_rows(&[&[1, 0], &[0, 0]]);
        let big = mask.resized(4, 4);
        assert_eq!(big.dimensions(), (4, 4));
        assert_eq!(big.area(), 4);
        assert!(big.get(0, 0) && big.get(1, 1));
        assert!(!big.get(2, 2));
    }

    #[test]
    fn test_simplify_collinear() {
        let line = vec![(0.0, 0.0), (0.0, 1.0), (0.0, 2.0), (0.0, 3.0)];
        assert_eq!(simplify(&line, 0.5), vec![(0.0, 0.0), (0.0, 3.0)]);
        assert_eq!(simplify(&line, 0.0), line);
    }
}

//! Stochastic (dithered) transparency.
//!
//! Fractional opacity is approximated without sorting: each fragment is compared against
//! an ordered-dither threshold and discarded when the threshold exceeds its opacity. The
//! threshold lookup is shifted every frame by a [`DitherJitter`] index so that, over one
//! full cycle of N² frames, every matrix cell is used exactly once per pixel. Temporal
//! accumulation of the downstream fog then averages the surviving fraction, which
//! converges to `round(opacity * N²) / N²`.
//!
//! The [`DitherMatrix`] is built here and uploaded verbatim to the stochastic depth pass,
//! so the shader never carries its own copy of the pattern.

use serde::{Deserialize, Serialize};

/// Edge length of the ordered dither matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DitherSize {
    #[default]
    Four,
    Eight,
}

impl DitherSize {
    pub fn edge(self) -> u32 {
        match self {
            DitherSize::Four => 4,
            DitherSize::Eight => 8,
        }
    }

    /// Number of cells, which is also the jitter period.
    pub fn cells(self) -> u32 {
        self.edge() * self.edge()
    }
}

/// Maximum number of thresholds the GPU uniform block holds (an 8×8 matrix).
pub const MAX_DITHER_CELLS: usize = 64;

/// An N×N Bayer matrix of thresholds `k / N²`, `k` in `0..N²`, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct DitherMatrix {
    size: DitherSize,
    values: Vec<f32>,
}

impl DitherMatrix {
    pub fn bayer(size: DitherSize) -> Self {
        let n = size.edge() as usize;
        const BASE: [[u32; 2]; 2] = [[0, 2], [3, 1]];

        // M(2k)[y][x] = 4 * M(k)[y mod k][x mod k] + BASE[y / k][x / k]
        let mut ranks = vec![0u32];
        let mut k = 1usize;
        while k < n {
            let next = k * 2;
            let mut grown = vec![0u32; next * next];
            for y in 0..next {
                for x in 0..next {
                    grown[y * next + x] = 4 * ranks[(y % k) * k + (x % k)] + BASE[y / k][x / k];
                }
            }
            ranks = grown;
            k = next;
        }

        let cells = size.cells() as f32;
        Self {
            size,
            values: ranks.into_iter().map(|r| r as f32 / cells).collect(),
        }
    }

    pub fn size(&self) -> DitherSize {
        self.size
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Threshold for pixel `(x, y)` at jitter index `jitter`.
    pub fn threshold(&self, x: u32, y: u32, jitter: u32) -> f32 {
        let n = self.size.edge();
        let col = (x + jitter % n) % n;
        let row = (y + jitter / n) % n;
        self.values[(row * n + col) as usize]
    }

    /// Half the spacing between thresholds. Comparing against the cell centre makes the
    /// survival count over a cycle round to nearest instead of rounding up.
    pub fn half_step(&self) -> f32 {
        0.5 / self.size.cells() as f32
    }

    /// Whether a fragment with `coverage` (opacity × alpha-map sample) survives `threshold`.
    pub fn survives(&self, threshold: f32, coverage: f32) -> bool {
        threshold + self.half_step() <= coverage
    }

    /// Thresholds packed into 16 `vec4`s for the uniform block; unused lanes are zero.
    pub fn packed(&self) -> [[f32; 4]; MAX_DITHER_CELLS / 4] {
        let mut packed = [[0.0; 4]; MAX_DITHER_CELLS / 4];
        for (i, v) in self.values.iter().enumerate() {
            packed[i / 4][i % 4] = *v;
        }
        packed
    }
}

/// Per-frame jitter index cycling modulo N².
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DitherJitter {
    size: DitherSize,
    index: u32,
}

impl DitherJitter {
    pub fn new(size: DitherSize) -> Self {
        Self { size, index: 0 }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn size(&self) -> DitherSize {
        self.size
    }

    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.size.cells();
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Changing the pattern length restarts the cycle.
    pub fn set_size(&mut self, size: DitherSize) {
        self.size = size;
        self.index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bayer_4x4_matches_reference_layout() {
        let m = DitherMatrix::bayer(DitherSize::Four);
        let ranks: Vec<u32> = m.values().iter().map(|v| (v * 16.0) as u32).collect();
        assert_eq!(
            ranks,
            vec![0, 8, 2, 10, 12, 4, 14, 6, 3, 11, 1, 9, 15, 7, 13, 5]
        );
    }

    #[test]
    fn matrix_holds_every_threshold_once() {
        for size in [DitherSize::Four, DitherSize::Eight] {
            let m = DitherMatrix::bayer(size);
            let cells = size.cells();
            let mut ranks: Vec<u32> = m
                .values()
                .iter()
                .map(|v| (v * cells as f32).round() as u32)
                .collect();
            ranks.sort_unstable();
            assert_eq!(ranks, (0..cells).collect::<Vec<_>>());
        }
    }

    #[test]
    fn jitter_visits_every_index_once_per_cycle() {
        for size in [DitherSize::Four, DitherSize::Eight] {
            let mut jitter = DitherJitter::new(size);
            let mut seen = vec![0u32; size.cells() as usize];
            for _ in 0..size.cells() {
                seen[jitter.index() as usize] += 1;
                jitter.advance();
            }
            assert!(seen.iter().all(|&count| count == 1));
            assert_eq!(jitter.index(), 0);
        }
    }

    #[test]
    fn each_pixel_sees_every_threshold_over_a_cycle() {
        let m = DitherMatrix::bayer(DitherSize::Eight);
        for (x, y) in [(0, 0), (5, 3), (17, 42)] {
            let mut seen: Vec<f32> = (0..64).map(|j| m.threshold(x, y, j)).collect();
            seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let mut expected = m.values().to_vec();
            expected.sort_by(|a, b| a.partial_cmp(b).unwrap());
            assert_eq!(seen, expected);
        }
    }

    #[test]
    fn survival_fraction_converges_to_rounded_opacity() {
        for size in [DitherSize::Four, DitherSize::Eight] {
            let m = DitherMatrix::bayer(size);
            let cells = size.cells();
            for step in 0..=20 {
                let opacity = step as f32 / 20.0;
                let survived = (0..cells)
                    .filter(|&j| m.survives(m.threshold(3, 7, j), opacity))
                    .count() as f32;
                assert_eq!(survived, (opacity * cells as f32).round(), "opacity {opacity}");
            }
        }
    }

    #[test]
    fn opaque_fragments_always_survive() {
        let m = DitherMatrix::bayer(DitherSize::Eight);
        assert!(m.values().iter().all(|&t| m.survives(t, 1.0)));
        assert!(m.values().iter().all(|&t| !m.survives(t, 0.0)));
    }

    #[test]
    fn resizing_restarts_the_cycle() {
        let mut jitter = DitherJitter::new(DitherSize::Four);
        jitter.advance();
        jitter.advance();
        jitter.set_size(DitherSize::Eight);
        assert_eq!(jitter.index(), 0);
        assert_eq!(jitter.size().cells(), 64);
    }

    #[test]
    fn packed_layout_preserves_order() {
        let m = DitherMatrix::bayer(DitherSize::Four);
        let packed = m.packed();
        assert_eq!(packed[0], [0.0, 0.5, 0.125, 0.625]);
        assert!(packed[4..].iter().all(|v| *v == [0.0; 4]));
    }
}

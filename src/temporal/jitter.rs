use glam::{Mat4, Vec2};

/// Length of the Halton(2, 3) sequence before it repeats.
pub const CAMERA_JITTER_PERIOD: u32 = 8;

/// Radical inverse of `index` in `base`.
pub fn halton(mut index: u32, base: u32) -> f32 {
    let mut fraction = 1.0;
    let mut result = 0.0;
    while index > 0 {
        fraction /= base as f32;
        result += fraction * (index % base) as f32;
        index /= base;
    }
    result
}

/// Sub-pixel camera offsets for the supersampled variant.
///
/// Offsets are in pixels, within `[-0.5, 0.5]`. The previous offset is kept so the
/// velocity pass can remove the jitter difference between frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraJitter {
    index: u32,
    previous: Vec2,
}

impl Default for CameraJitter {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraJitter {
    pub fn new() -> Self {
        Self {
            index: 0,
            previous: Self::offset_at(0),
        }
    }

    fn offset_at(index: u32) -> Vec2 {
        // index 0 of Halton is 0 in both bases, which would bias the pattern to a corner
        let i = index % CAMERA_JITTER_PERIOD + 1;
        Vec2::new(halton(i, 2) - 0.5, halton(i, 3) - 0.5)
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Current offset in pixels.
    pub fn offset(&self) -> Vec2 {
        Self::offset_at(self.index)
    }

    /// Offset used by the previous frame, in pixels.
    pub fn previous_offset(&self) -> Vec2 {
        self.previous
    }

    pub fn advance(&mut self) {
        self.previous = self.offset();
        self.index = (self.index + 1) % CAMERA_JITTER_PERIOD;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Pixel offset converted to NDC for a `width`×`height` target.
    pub fn ndc_offset(offset: Vec2, width: u32, height: u32) -> Vec2 {
        Vec2::new(
            2.0 * offset.x / width.max(1) as f32,
            2.0 * offset.y / height.max(1) as f32,
        )
    }

    /// A copy of `projection` that shifts every projected point by `ndc` after the
    /// perspective divide.
    pub fn jittered(projection: Mat4, ndc: Vec2) -> Mat4 {
        let mut m = projection;
        for col in [&mut m.x_axis, &mut m.y_axis, &mut m.z_axis, &mut m.w_axis] {
            col.x += ndc.x * col.w;
            col.y += ndc.y * col.w;
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn halton_matches_known_values() {
        assert_eq!(halton(1, 2), 0.5);
        assert_eq!(halton(2, 2), 0.25);
        assert_eq!(halton(3, 2), 0.75);
        assert!((halton(1, 3) - 1.0 / 3.0).abs() < 1e-6);
        assert!((halton(2, 3) - 2.0 / 3.0).abs() < 1e-6);
        assert!((halton(4, 3) - 4.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn offsets_stay_within_half_a_pixel_and_repeat() {
        let mut jitter = CameraJitter::new();
        let first = jitter.offset();
        let mut seen = Vec::new();
        for _ in 0..CAMERA_JITTER_PERIOD {
            let o = jitter.offset();
            assert!(o.x.abs() <= 0.5 && o.y.abs() <= 0.5);
            assert!(!seen.contains(&o));
            seen.push(o);
            jitter.advance();
        }
        assert_eq!(jitter.offset(), first);
    }

    #[test]
    fn jitter_shifts_ndc_by_exact_amount() {
        let proj = Mat4::perspective_rh(1.0, 1.5, 0.1, 100.0);
        let ndc = Vec2::new(0.01, -0.02);
        let jittered = CameraJitter::jittered(proj, ndc);
        for p in [Vec4::new(0.3, -0.2, -4.0, 1.0), Vec4::new(-2.0, 1.0, -30.0, 1.0)] {
            let a = proj * p;
            let b = jittered * p;
            assert!(((b.x / b.w) - (a.x / a.w) - ndc.x).abs() < 1e-5);
            assert!(((b.y / b.w) - (a.y / a.w) - ndc.y).abs() < 1e-5);
            assert!(((b.z / b.w) - (a.z / a.w)).abs() < 1e-6);
        }
    }

    #[test]
    fn advance_remembers_previous_offset() {
        let mut jitter = CameraJitter::new();
        let before = jitter.offset();
        jitter.advance();
        assert_eq!(jitter.previous_offset(), before);
        jitter.reset();
        assert_eq!(jitter.index(), 0);
    }
}

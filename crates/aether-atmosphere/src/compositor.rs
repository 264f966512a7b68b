//! Applies aerial perspective to a rendered scene.
//!
//! `final = scene * transmittance + inscatter`, sampled from the
//! aerial-perspective volume at each pixel's screen position and view
//! distance. The result is written into a scratch buffer which is then
//! swapped with the caller's color buffer.

use glam::Vec4;

use crate::aerial_perspective::AerialPerspectiveLut;
use crate::error::AtmosphereError;
use crate::lut::Texel;
use crate::parallel::for_each_row;

/// Linear RGBA color target, row-major, row 0 at the top.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Texel>,
}

impl ColorBuffer {
    /// A buffer with every pixel set to `value`.
    pub fn filled(width: u32, height: u32, value: Texel) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; width as usize * height as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Texel) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Texel {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    pub fn pixels(&self) -> &[Texel] {
        &self.pixels
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.resize(width as usize * height as usize, [0.0; 4]);
    }
}

/// Per-pixel view distance in meters. Non-finite values mark pixels with no
/// geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthBuffer {
    width: u32,
    height: u32,
    distances: Vec<f32>,
}

impl DepthBuffer {
    pub fn filled(width: u32, height: u32, distance: f32) -> Self {
        Self {
            width,
            height,
            distances: vec![distance; width as usize * height as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut distances = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                distances.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            distances,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn distance(&self, x: u32, y: u32) -> f32 {
        self.distances[y as usize * self.width as usize + x as usize]
    }
}

/// Apply aerial perspective to one scene pixel. Sky pixels pass through.
pub fn composite_pixel(scene: Texel, distance: f32, aerial: Vec4) -> Texel {
    if !distance.is_finite() {
        return scene;
    }
    let t = aerial.w;
    [
        scene[0] * t + aerial.x,
        scene[1] * t + aerial.y,
        scene[2] * t + aerial.z,
        scene[3],
    ]
}

/// Double-buffered aerial-perspective compositor.
#[derive(Debug, Default)]
pub struct Compositor {
    scratch: Option<ColorBuffer>,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Composite `color` in place using `depth` and the aerial volume.
    ///
    /// `color` and `depth` must have the same size. The scratch buffer
    /// follows the color size and is reallocated only when it changes.
    pub fn apply(
        &mut self,
        color: &mut ColorBuffer,
        depth: &DepthBuffer,
        aerial: &AerialPerspectiveLut<'_>,
    ) -> Result<(), AtmosphereError> {
        if color.size() != depth.size() {
            return Err(AtmosphereError::DimensionMismatch {
                expected: color.size(),
                actual: depth.size(),
            });
        }
        let (width, height) = color.size();
        let scratch = self
            .scratch
            .get_or_insert_with(|| ColorBuffer::filled(width, height, [0.0; 4]));
        if scratch.size() != color.size() {
            scratch.resize(width, height);
        }

        let scene = &color.pixels;
        let row_len = width as usize;
        for_each_row(&mut scratch.pixels, row_len, |y, row| {
            let v = (y as f32 + 0.5) / height as f32;
            for (x, out) in row.iter_mut().enumerate() {
                let index = y * row_len + x;
                let distance = depth.distances[index];
                let u = (x as f32 + 0.5) / width as f32;
                let sample = if distance.is_finite() {
                    aerial.sample(u, v, distance)
                } else {
                    Vec4::W
                };
                *out = composite_pixel(scene[index], distance, sample);
            }
        });

        std::mem::swap(&mut color.pixels, &mut scratch.pixels);
        Ok(())
    }

    /// Drop the scratch buffer.
    pub fn release(&mut self) {
        self.scratch = None;
    }
}

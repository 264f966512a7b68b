//! Lookup-table storage, shapes and filtered sampling.
//!
//! Every table holds RGBA `f32` texels. Volumes are flattened along X: texel
//! `(slice * width + x, y)` holds voxel `(x, y, slice)`, which is the layout
//! uploaded to the GPU as a single 2D texture.

use glam::Vec4;

use crate::error::AtmosphereError;

/// One RGBA texel.
pub type Texel = [f32; 4];

/// The four tables produced by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LutKind {
    Transmittance,
    MultiScattering,
    SkyView,
    AerialPerspective,
}

impl LutKind {
    /// All kinds in dependency order.
    pub const ALL: [LutKind; 4] = [
        LutKind::Transmittance,
        LutKind::MultiScattering,
        LutKind::SkyView,
        LutKind::AerialPerspective,
    ];

    /// Name under which the table is exposed to other render passes.
    pub fn global_name(self) -> &'static str {
        match self {
            LutKind::Transmittance => "transmittance_lut",
            LutKind::MultiScattering => "multi_scattering_lut",
            LutKind::SkyView => "sky_view_lut",
            LutKind::AerialPerspective => "aerial_perspective_lut",
        }
    }
}

/// Logical dimensions of a table. `slices` is 1 for 2D tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LutShape {
    pub width: u32,
    pub height: u32,
    pub slices: u32,
}

impl LutShape {
    pub const fn plane(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            slices: 1,
        }
    }

    pub const fn volume(width: u32, height: u32, slices: u32) -> Self {
        Self {
            width,
            height,
            slices,
        }
    }

    /// Width of the flattened 2D layout, if it fits in `u32`.
    pub fn texel_width(&self) -> Option<u32> {
        self.width.checked_mul(self.slices)
    }

    /// Number of texels, if the table is addressable on this platform.
    pub fn texel_count(&self) -> Option<usize> {
        let width = usize::try_from(self.texel_width()?).ok()?;
        width.checked_mul(usize::try_from(self.height).ok()?)
    }
}

pub const TRANSMITTANCE_SHAPE: LutShape = LutShape::plane(256, 64);
pub const MULTI_SCATTERING_SHAPE: LutShape = LutShape::plane(32, 32);
pub const SKY_VIEW_SHAPE: LutShape = LutShape::plane(256, 128);
/// 32x32 froxels by 32 distance slices, flattened to 1024x32.
pub const AERIAL_PERSPECTIVE_SHAPE: LutShape = LutShape::volume(32, 32, 32);

/// A 2D or flattened 3D grid of RGBA texels.
#[derive(Clone, Debug, PartialEq)]
pub struct LookupTable {
    kind: LutKind,
    shape: LutShape,
    texels: Vec<Texel>,
}

impl LookupTable {
    /// Allocate a zero-filled table.
    ///
    /// Allocation is fallible: an empty, overflowing or unsatisfiable shape
    /// yields [`AtmosphereError::Allocation`] instead of aborting.
    pub fn try_new(kind: LutKind, shape: LutShape) -> Result<Self, AtmosphereError> {
        let allocation_error = AtmosphereError::Allocation {
            table: kind,
            width: shape.texel_width().unwrap_or(u32::MAX),
            height: shape.height,
        };
        let len = match shape.texel_count() {
            Some(len) if len > 0 => len,
            _ => return Err(allocation_error),
        };

        let mut texels = Vec::new();
        texels
            .try_reserve_exact(len)
            .map_err(|_| allocation_error)?;
        texels.resize(len, [0.0; 4]);

        Ok(Self {
            kind,
            shape,
            texels,
        })
    }

    pub fn kind(&self) -> LutKind {
        self.kind
    }

    pub fn shape(&self) -> LutShape {
        self.shape
    }

    /// Width of the flattened layout in texels.
    pub fn texel_width(&self) -> u32 {
        self.shape.width * self.shape.slices
    }

    pub fn texel_height(&self) -> u32 {
        self.shape.height
    }

    /// Row-major texels of the flattened layout.
    pub fn texels(&self) -> &[Texel] {
        &self.texels
    }

    pub(crate) fn texels_mut(&mut self) -> &mut [Texel] {
        &mut self.texels
    }

    /// Raw bytes for GPU upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }

    /// Texel at flattened coordinates.
    pub fn texel(&self, x: u32, y: u32) -> Texel {
        self.texels[y as usize * self.texel_width() as usize + x as usize]
    }

    /// Texel of voxel `(x, y)` in `slice`.
    pub fn voxel(&self, x: u32, y: u32, slice: u32) -> Texel {
        self.texel(slice * self.shape.width + x, y)
    }

    /// Bilinear sample of a 2D table at normalized `(u, v)`, clamped to edge.
    pub fn sample(&self, u: f32, v: f32) -> Vec4 {
        self.sample_slice(u, v, 0)
    }

    /// Bilinear sample within one slice of a volume, clamped to edge.
    ///
    /// Texel centers sit at `(i + 0.5) / size`.
    pub fn sample_slice(&self, u: f32, v: f32, slice: u32) -> Vec4 {
        let width = self.shape.width;
        let height = self.shape.height;
        let slice = slice.min(self.shape.slices - 1);

        let x = (u * width as f32 - 0.5).clamp(0.0, (width - 1) as f32);
        let y = (v * height as f32 - 0.5).clamp(0.0, (height - 1) as f32);
        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        let x1 = (x0 + 1).min(width - 1);
        let y1 = (y0 + 1).min(height - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let fetch = |x: u32, y: u32| Vec4::from(self.voxel(x, y, slice));
        let top = fetch(x0, y0).lerp(fetch(x1, y0), fx);
        let bottom = fetch(x0, y1).lerp(fetch(x1, y1), fx);
        top.lerp(bottom, fy)
    }

    /// Whether every component is finite and non-negative.
    pub fn is_physically_valid(&self) -> bool {
        self.texels
            .iter()
            .flatten()
            .all(|c| c.is_finite() && *c >= 0.0)
    }
}

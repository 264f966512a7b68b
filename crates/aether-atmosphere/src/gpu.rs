//! Upload of lookup tables into named `wgpu` textures.
//!
//! Tables are stored as `Rgba32Float`, which is not filterable without
//! `FLOAT32_FILTERABLE`; shaders either request that feature or filter
//! manually with `textureLoad`.

use crate::lut::{LookupTable, LutKind, LutShape};
use crate::pipeline::FrameTables;

/// Texel format of every table texture.
pub const LUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Texture extent of a table: volumes use their flattened 2D layout.
pub fn texture_extent(shape: LutShape) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: shape.width * shape.slices,
        height: shape.height,
        depth_or_array_layers: 1,
    }
}

/// Descriptor of the texture backing a table.
pub fn texture_descriptor(kind: LutKind, shape: LutShape) -> wgpu::TextureDescriptor<'static> {
    wgpu::TextureDescriptor {
        label: Some(kind.global_name()),
        size: texture_extent(shape),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: LUT_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    }
}

fn bytes_per_row(width: u32) -> u32 {
    width * LUT_FORMAT.block_copy_size(None).unwrap_or(16)
}

/// A table texture with its default view.
pub struct LutTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub shape: LutShape,
}

/// The four table textures, created on first upload and recreated when a
/// table changes shape.
#[derive(Default)]
pub struct LutTextures {
    textures: [Option<LutTexture>; 4],
}

fn slot(kind: LutKind) -> usize {
    match kind {
        LutKind::Transmittance => 0,
        LutKind::MultiScattering => 1,
        LutKind::SkyView => 2,
        LutKind::AerialPerspective => 3,
    }
}

impl LutTextures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write every table of the frame into its texture.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, tables: &FrameTables<'_>) {
        for table in tables.iter() {
            self.upload_table(device, queue, table);
        }
    }

    /// Write one table, creating or recreating its texture as needed.
    pub fn upload_table(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, table: &LookupTable) {
        let kind = table.kind();
        let shape = table.shape();
        let entry = &mut self.textures[slot(kind)];
        if entry.as_ref().is_none_or(|existing| existing.shape != shape) {
            let texture = device.create_texture(&texture_descriptor(kind, shape));
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            tracing::debug!(
                table = kind.global_name(),
                width = table.texel_width(),
                height = table.texel_height(),
                "Created LUT texture"
            );
            *entry = Some(LutTexture {
                texture,
                view,
                shape,
            });
        }
        let Some(target) = entry.as_ref() else {
            return;
        };

        let extent = texture_extent(shape);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            table.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row(extent.width)),
                rows_per_image: Some(extent.height),
            },
            extent,
        );
    }

    pub fn get(&self, kind: LutKind) -> Option<&LutTexture> {
        self.textures[slot(kind)].as_ref()
    }

    /// Views of every uploaded table under its global name.
    pub fn named_views(&self) -> impl Iterator<Item = (&'static str, &wgpu::TextureView)> {
        LutKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|t| (kind.global_name(), &t.view)))
    }

    /// Drop every texture.
    pub fn release(&mut self) {
        self.textures = Default::default();
    }
}

//! Encode/decode functions between table coordinates and physical
//! quantities.
//!
//! The parametrisations work on unit-range coordinates. Tables store them on
//! the texel-center grid through [`unit_to_texel_coord`], so the first and
//! last texel of each axis hold the exact boundary values (zenith, horizon,
//! surface, top of the atmosphere) and bilinear lookups never clamp past them.

use std::f64::consts::PI;

use glam::DVec3;

use crate::medium::distance_to_top;

/// Texture coordinate of unit-range `x` on an axis of `size` texels: 0 and 1
/// land on the centers of the first and last texel.
pub fn unit_to_texel_coord(x: f64, size: u32) -> f64 {
    let n = f64::from(size.max(1));
    0.5 / n + x * (1.0 - 1.0 / n)
}

/// Inverse of [`unit_to_texel_coord`].
pub fn texel_coord_to_unit(u: f64, size: u32) -> f64 {
    if size <= 1 {
        return 0.0;
    }
    let n = f64::from(size);
    ((u - 0.5 / n) / (1.0 - 1.0 / n)).clamp(0.0, 1.0)
}

/// Unit-range coordinate of texel `index` on an axis of `size` texels.
pub fn texel_unit(index: usize, size: u32) -> f64 {
    texel_coord_to_unit((index as f64 + 0.5) / f64::from(size.max(1)), size)
}

/// Transmittance uv to `(r, mu)`: radius from the planet center and cosine
/// of the zenith angle.
///
/// `v` parametrizes the distance to the horizon, so row 0 is the surface
/// and the last row the top of the atmosphere. `u` parametrizes the distance
/// to the atmosphere boundary between its minimum (looking up) and maximum
/// (looking at the horizon), which packs resolution near the horizon.
pub fn transmittance_uv_to_params(u: f64, v: f64, bottom: f64, top: f64) -> (f64, f64) {
    let h = (top * top - bottom * bottom).sqrt();
    let rho = h * v;
    let r = (rho * rho + bottom * bottom).sqrt();

    let d_min = top - r;
    let d_max = rho + h;
    let d = d_min + u * (d_max - d_min);
    let mu = if d <= 0.0 {
        1.0
    } else {
        (h * h - rho * rho - d * d) / (2.0 * r * d)
    };
    (r, mu.clamp(-1.0, 1.0))
}

/// Inverse of [`transmittance_uv_to_params`].
pub fn transmittance_params_to_uv(r: f64, mu: f64, bottom: f64, top: f64) -> (f64, f64) {
    let h = (top * top - bottom * bottom).sqrt();
    let rho = (r * r - bottom * bottom).max(0.0).sqrt();

    let d = distance_to_top(r, mu, top);
    let d_min = top - r;
    let d_max = rho + h;
    let u = (d - d_min) / (d_max - d_min);
    let v = rho / h;
    (u.clamp(0.0, 1.0), v.clamp(0.0, 1.0))
}

/// Multi-scattering uv to `(mu_s, altitude)`.
pub fn multi_scattering_uv_to_params(u: f64, v: f64, atmosphere_height: f64) -> (f64, f64) {
    (u * 2.0 - 1.0, v * atmosphere_height)
}

/// Inverse of [`multi_scattering_uv_to_params`].
pub fn multi_scattering_params_to_uv(mu_s: f64, altitude: f64, atmosphere_height: f64) -> (f64, f64) {
    (
        (mu_s * 0.5 + 0.5).clamp(0.0, 1.0),
        (altitude / atmosphere_height).clamp(0.0, 1.0),
    )
}

/// Zenith angle of the geometric horizon and its depression below the
/// horizontal, seen from radius `r`.
fn horizon_angles(r: f64, bottom: f64) -> (f64, f64) {
    let r = r.max(bottom);
    let horizon_distance = (r * r - bottom * bottom).max(0.0).sqrt();
    let beta = (horizon_distance / r).clamp(-1.0, 1.0).acos();
    (PI - beta, beta)
}

/// Sky-view uv to a world-space unit direction (Y up).
///
/// `u` covers world azimuth in `[-pi, pi]`. `v` covers view zenith with
/// `v = 0.5` on the geometric horizon of the camera and quadratic spacing
/// on either side.
pub fn sky_view_uv_to_direction(u: f64, v: f64, camera_radius: f64, bottom: f64) -> DVec3 {
    let (zenith_horizon, beta) = horizon_angles(camera_radius, bottom);

    let zenith = if v < 0.5 {
        let coord = 1.0 - 2.0 * v;
        zenith_horizon * (1.0 - coord * coord)
    } else {
        let coord = v * 2.0 - 1.0;
        zenith_horizon + beta * coord * coord
    };
    let azimuth = (u * 2.0 - 1.0) * PI;

    DVec3::new(
        zenith.sin() * azimuth.cos(),
        zenith.cos(),
        zenith.sin() * azimuth.sin(),
    )
}

/// Inverse of [`sky_view_uv_to_direction`].
pub fn sky_view_direction_to_uv(dir: DVec3, camera_radius: f64, bottom: f64) -> (f64, f64) {
    let (zenith_horizon, beta) = horizon_angles(camera_radius, bottom);
    let zenith = dir.y.clamp(-1.0, 1.0).acos();

    let v = if zenith < zenith_horizon {
        let coord = 1.0 - (1.0 - zenith / zenith_horizon).max(0.0).sqrt();
        coord * 0.5
    } else {
        let coord = ((zenith - zenith_horizon) / beta.max(1e-9)).min(1.0).sqrt();
        coord * 0.5 + 0.5
    };
    let azimuth = dir.z.atan2(dir.x);
    let u = (azimuth / PI + 1.0) * 0.5;
    (u.clamp(0.0, 1.0), v.clamp(0.0, 1.0))
}

/// Distance stored by aerial-perspective slice `slice` (far edge of the
/// slice). Quadratic, so slices are denser near the camera.
pub fn aerial_slice_distance(slice: u32, slices: u32, max_distance: f64) -> f64 {
    let t = f64::from(slice + 1) / f64::from(slices);
    max_distance * t * t
}

/// Continuous slice coordinate for a distance. `-1` is the camera itself,
/// `slices - 1` the far end of the volume.
pub fn aerial_distance_to_slice(distance: f64, slices: u32, max_distance: f64) -> f64 {
    (distance.max(0.0) / max_distance).sqrt() * f64::from(slices) - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOTTOM: f64 = 6_360_000.0;
    const TOP: f64 = 6_420_000.0;

    #[test]
    fn test_texel_grid_edges_are_exact() {
        assert_eq!(texel_unit(0, 64), 0.0);
        assert!((texel_unit(63, 64) - 1.0).abs() < 1e-12);
        assert!((unit_to_texel_coord(0.0, 64) - 0.5 / 64.0).abs() < 1e-15);
        assert!((unit_to_texel_coord(1.0, 64) - 63.5 / 64.0).abs() < 1e-15);
        for x in [0.0, 0.2, 0.5, 0.93, 1.0] {
            let back = texel_coord_to_unit(unit_to_texel_coord(x, 256), 256);
            assert!((back - x).abs() < 1e-12, "{x} -> {back}");
        }
        assert_eq!(texel_unit(0, 1), 0.0);
    }

    #[test]
    fn test_transmittance_corners() {
        let (r, mu) = transmittance_uv_to_params(0.0, 0.0, BOTTOM, TOP);
        assert!((r - BOTTOM).abs() < 1e-6);
        assert!((mu - 1.0).abs() < 1e-9);

        let (r, mu) = transmittance_uv_to_params(1.0, 0.0, BOTTOM, TOP);
        assert!((r - BOTTOM).abs() < 1e-6);
        assert!(mu.abs() < 1e-9, "u = 1 at the surface is the horizon, got {mu}");

        let (r, _) = transmittance_uv_to_params(0.5, 1.0, BOTTOM, TOP);
        assert!((r - TOP).abs() < 1e-6);
    }

    #[test]
    fn test_transmittance_mapping_roundtrip() {
        for &(u, v) in &[(0.1, 0.2), (0.5, 0.5), (0.9, 0.05), (0.33, 0.8)] {
            let (r, mu) = transmittance_uv_to_params(u, v, BOTTOM, TOP);
            let (u2, v2) = transmittance_params_to_uv(r, mu, BOTTOM, TOP);
            assert!((u - u2).abs() < 1e-6, "u {u} -> {u2}");
            assert!((v - v2).abs() < 1e-6, "v {v} -> {v2}");
        }
    }

    #[test]
    fn test_transmittance_resolution_concentrates_at_horizon() {
        // Equal steps in u cover much less of mu near the horizon.
        let (_, mu_a) = transmittance_uv_to_params(0.0, 0.0, BOTTOM, TOP);
        let (_, mu_b) = transmittance_uv_to_params(0.1, 0.0, BOTTOM, TOP);
        let (_, mu_c) = transmittance_uv_to_params(0.9, 0.0, BOTTOM, TOP);
        let (_, mu_d) = transmittance_uv_to_params(1.0, 0.0, BOTTOM, TOP);
        assert!((mu_a - mu_b).abs() > (mu_c - mu_d).abs());
    }

    #[test]
    fn test_multi_scattering_roundtrip() {
        let (mu, h) = multi_scattering_uv_to_params(0.75, 0.25, 60_000.0);
        assert!((mu - 0.5).abs() < 1e-12);
        assert!((h - 15_000.0).abs() < 1e-9);
        let (u, v) = multi_scattering_params_to_uv(mu, h, 60_000.0);
        assert!((u - 0.75).abs() < 1e-12 && (v - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_sky_view_zenith_and_horizon() {
        let r = BOTTOM + 1.0;
        let up = sky_view_uv_to_direction(0.5, 0.0, r, BOTTOM);
        assert!((up - DVec3::Y).length() < 1e-9);

        let horizon = sky_view_uv_to_direction(0.5, 0.5, r, BOTTOM);
        assert!(horizon.y.abs() < 1e-3, "v = 0.5 should be near horizontal at the surface");

        let down = sky_view_uv_to_direction(0.5, 1.0, r, BOTTOM);
        assert!((down + DVec3::Y).length() < 1e-9);
    }

    #[test]
    fn test_sky_view_roundtrip() {
        let r = BOTTOM + 1500.0;
        for &(u, v) in &[(0.1, 0.1), (0.4, 0.45), (0.6, 0.55), (0.95, 0.9)] {
            let dir = sky_view_uv_to_direction(u, v, r, BOTTOM);
            assert!((dir.length() - 1.0).abs() < 1e-9);
            let (u2, v2) = sky_view_direction_to_uv(dir, r, BOTTOM);
            assert!((u - u2).abs() < 1e-6, "u {u} -> {u2}");
            assert!((v - v2).abs() < 1e-6, "v {v} -> {v2}");
        }
    }

    #[test]
    fn test_aerial_slices_denser_near_camera() {
        let max = 32_000.0;
        let first = aerial_slice_distance(0, 32, max);
        let second = aerial_slice_distance(1, 32, max);
        let last = aerial_slice_distance(31, 32, max);
        let before_last = aerial_slice_distance(30, 32, max);
        assert!((last - max).abs() < 1e-9);
        assert!(second - first < last - before_last);
        assert!((aerial_distance_to_slice(first, 32, max) - 0.0).abs() < 1e-9);
        assert!((aerial_distance_to_slice(last, 32, max) - 31.0).abs() < 1e-9);
        assert!((aerial_distance_to_slice(0.0, 32, max) + 1.0).abs() < 1e-12);
    }
}

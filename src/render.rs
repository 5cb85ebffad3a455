//! Image Renderer (C5)
//!
//! Turns the solver's flat `f` vector into a displayable raster. The
//! pipeline is: sanitize non-finite values, min-max normalize to `[0, 255]`,
//! then apply a 98th-percentile threshold with 3x3 non-maximum suppression
//! ("clean" pass, §4.5). No PNG/JPEG crate exists anywhere in the reference
//! pack, so the writer emits PGM "P2" (plain ASCII grayscale) instead of
//! fabricating a raster-encoding dependency (§9 Design Notes).

use std::io::Write as _;
use std::path::Path;

use crate::error::AppError;

/// Sanitize, normalize, and clean an `f` vector of length `width * height`
/// into `u8` pixel intensities, row-major, top-to-bottom.
pub fn render_u8(f: &[f64], width: usize, height: usize) -> Result<Vec<u8>, AppError> {
    if f.len() != width * height {
        return Err(AppError::DimensionMismatch(format!(
            "render input has {} samples, expected {}x{}={}",
            f.len(),
            width,
            height,
            width * height
        )));
    }

    let sanitized: Vec<f64> = f
        .iter()
        .map(|&v| if v.is_finite() { v } else { 0.0 })
        .collect();

    let normalized = normalize(&sanitized);
    let cleaned = clean(&normalized, width, height);

    Ok(cleaned
        .iter()
        .map(|&v| v.clamp(0.0, 255.0).floor() as u8)
        .collect())
}

/// Min-max normalize into `[0, 255]`. A degenerate (near-constant) input
/// maps uniformly to `0.0` rather than dividing by a near-zero range
/// (§4.5: "a flat field produces a flat, uniformly black raster").
fn normalize(v: &[f64]) -> Vec<f64> {
    let min = v.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if range < 1e-12 {
        return vec![0.0; v.len()];
    }

    v.iter().map(|&x| (x - min) / range * 255.0).collect()
}

/// 98th-percentile threshold followed by 3x3 non-maximum suppression.
/// Pixels below the threshold are zeroed; surviving pixels that are not the
/// local maximum in their 3x3 neighborhood are also zeroed (§4.5). Always
/// applied — the observed reference source never exposes a toggle to skip
/// it (§9 Open Question).
fn clean(v: &[f64], width: usize, height: usize) -> Vec<f64> {
    let threshold = percentile(v, 98.0);

    let thresholded: Vec<f64> = v
        .iter()
        .map(|&x| if x >= threshold { x } else { 0.0 })
        .collect();

    let mut out = vec![0.0; v.len()];
    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let center = thresholded[idx];
            if center <= 0.0 {
                continue;
            }
            let mut is_max = true;
            'neighbors: for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let ny = y as isize + dy;
                    let nx = x as isize + dx;
                    if ny < 0 || nx < 0 || ny >= height as isize || nx >= width as isize {
                        continue;
                    }
                    let neighbor = thresholded[ny as usize * width + nx as usize];
                    if neighbor > center {
                        is_max = false;
                        break 'neighbors;
                    }
                }
            }
            if is_max {
                out[idx] = center;
            }
        }
    }
    out
}

/// Linear-interpolation percentile over a copy of `v`, matching
/// `numpy.percentile`'s default `linear` method (the behavior of
/// `original_source/server-python/servidor_numPy.py`'s
/// `np.percentile(..., 98.0)` call).
fn percentile(v: &[f64], p: f64) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    let mut sorted = v.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let idx = (p / 100.0) * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = idx - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Write `pixels` as a PGM "P2" plain-text grayscale raster.
pub fn write_pgm(path: &Path, pixels: &[u8], width: usize, height: usize) -> Result<(), AppError> {
    if pixels.len() != width * height {
        return Err(AppError::RenderFailure(
            "pixel buffer does not match declared dimensions".into(),
        ));
    }
    let mut out = String::with_capacity(pixels.len() * 4 + 32);
    out.push_str("P2\n");
    out.push_str(&format!("{} {}\n255\n", width, height));
    for (i, p) in pixels.iter().enumerate() {
        if i > 0 {
            out.push(if (i % width) == 0 { '\n' } else { ' ' });
        }
        out.push_str(&p.to_string());
    }
    out.push('\n');

    let mut file = std::fs::File::create(path)
        .map_err(|e| AppError::RenderFailure(format!("creating {}: {}", path.display(), e)))?;
    file.write_all(out.as_bytes())
        .map_err(|e| AppError::RenderFailure(format!("writing {}: {}", path.display(), e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn render_output_stays_in_byte_range() {
        let f = vec![-5.0, 0.0, 100.0, f64::NAN, f64::INFINITY, 3.3, -f64::INFINITY, 2.0];
        let pixels = render_u8(&f, 4, 2).unwrap();
        assert_eq!(pixels.len(), 8);
    }

    #[test]
    fn flat_field_renders_uniformly_black() {
        let f = vec![7.0; 16];
        let pixels = render_u8(&f, 4, 4).unwrap();
        assert!(pixels.iter().all(|&p| p == 0));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let f = vec![1.0, 2.0, 3.0];
        assert!(render_u8(&f, 2, 2).is_err());
    }

    #[test]
    fn pgm_round_trip_header_and_counts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.pgm");
        let pixels = vec![0u8, 128, 255, 64];
        write_pgm(&path, &pixels, 2, 2).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "P2");
        assert_eq!(lines.next().unwrap(), "2 2");
        assert_eq!(lines.next().unwrap(), "255");

        let numbers: Vec<u8> = content
            .split_whitespace()
            .skip(3)
            .map(|t| t.parse().unwrap())
            .collect();
        assert_eq!(numbers, pixels);
    }

    #[test]
    fn single_bright_spot_survives_cleaning() {
        let mut f = vec![0.0; 25];
        f[12] = 1000.0; // center of a 5x5 grid
        let pixels = render_u8(&f, 5, 5).unwrap();
        assert_eq!(pixels[12], 255);
    }
}

//! Scalar CPU kernels behind [`crate::filter::apply`].
//!
//! Every kernel is pure: output bytes depend only on the input buffer and the
//! derived parameter. Per-pixel kernels run row-parallel via rayon, which
//! keeps determinism since each output row reads only the input buffer.

use rayon::prelude::*;

/// Linear blend toward the sepia color matrix by `intensity` in [0, 1].
/// Intensity 0 is byte-identical to the input.
pub(crate) fn sepia(src: &[u8], intensity: f64) -> Vec<u8> {
    let t = intensity.clamp(0.0, 1.0) as f32;
    let mut dst = vec![0u8; src.len()];
    dst.par_chunks_mut(4)
        .zip(src.par_chunks(4))
        .for_each(|(d, s)| {
            let (r, g, b) = (s[0] as f32, s[1] as f32, s[2] as f32);
            let sr = (0.393 * r + 0.769 * g + 0.189 * b).min(255.0);
            let sg = (0.349 * r + 0.686 * g + 0.168 * b).min(255.0);
            let sb = (0.272 * r + 0.534 * g + 0.131 * b).min(255.0);
            d[0] = (r + (sr - r) * t).round().clamp(0.0, 255.0) as u8;
            d[1] = (g + (sg - g) * t).round().clamp(0.0, 255.0) as u8;
            d[2] = (b + (sb - b) * t).round().clamp(0.0, 255.0) as u8;
            d[3] = s[3];
        });
    dst
}

/// Radial darkening toward the corners, scaled by `intensity`. The exact
/// center is always left untouched.
pub(crate) fn vignette(src: &[u8], width: u32, height: u32, intensity: f64) -> Vec<u8> {
    let amount = intensity.clamp(0.0, 1.0) as f32;
    let cx = (width.saturating_sub(1)) as f32 / 2.0;
    let cy = (height.saturating_sub(1)) as f32 / 2.0;
    let max_dist = (cx * cx + cy * cy).sqrt().max(1.0);
    let stride = width as usize * 4;

    let mut dst = vec![0u8; src.len()];
    dst.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &src[y * stride..y * stride + stride];
            for x in 0..width as usize {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                let dist = (dx * dx + dy * dy).sqrt() / max_dist;
                let vf = (1.0 - amount * dist.min(1.0).powi(2)).clamp(0.0, 1.0);
                let pi = x * 4;
                for c in 0..3 {
                    row_out[pi + c] =
                        ((row_in[pi + c] as f32) * vf).round().clamp(0.0, 255.0) as u8;
                }
                row_out[pi + 3] = row_in[pi + 3];
            }
        });
    dst
}

/// Separable Gaussian blur with a Q16 fixed-point kernel and clamp-to-edge
/// sampling. `sigma` is derived as `radius / 2`; radius below one pixel is
/// the identity.
pub(crate) fn gaussian_blur(src: &[u8], width: u32, height: u32, radius: f64) -> Vec<u8> {
    let radius_px = radius.max(0.0).round() as u32;
    if radius_px == 0 {
        return src.to_vec();
    }

    let kernel = gaussian_kernel_q16(radius_px, (radius / 2.0) as f32);
    let mut tmp = vec![0u8; src.len()];
    let mut out = vec![0u8; src.len()];
    horizontal_pass(src, &mut tmp, width, height, &kernel);
    vertical_pass(&tmp, &mut out, width, height, &kernel);
    out
}

/// Unsharp mask: `out = src + (src - blurred)` per color channel, alpha
/// preserved. The blur radius comes from the radius mapping.
pub(crate) fn unsharp(src: &[u8], width: u32, height: u32, radius: f64) -> Vec<u8> {
    if radius.max(0.0).round() as u32 == 0 {
        return src.to_vec();
    }
    let blurred = gaussian_blur(src, width, height, radius);

    let mut dst = vec![0u8; src.len()];
    dst.par_chunks_mut(4)
        .zip(src.par_chunks(4).zip(blurred.par_chunks(4)))
        .for_each(|(d, (s, b))| {
            for c in 0..3 {
                let v = s[c] as f32 + (s[c] as f32 - b[c] as f32);
                d[c] = v.round().clamp(0.0, 255.0) as u8;
            }
            d[3] = s[3];
        });
    dst
}

/// Square blocks of `scale` pixels, each replaced by the sample at its block
/// center.
pub(crate) fn pixellate(src: &[u8], width: u32, height: u32, scale: f64) -> Vec<u8> {
    let bs = scale.max(0.0).round() as u32;
    if bs <= 1 {
        return src.to_vec();
    }
    let stride = width as usize * 4;

    let mut dst = vec![0u8; src.len()];
    dst.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let by = ((y as u32 / bs) * bs + bs / 2).min(height - 1) as usize;
            for x in 0..width as usize {
                let bx = ((x as u32 / bs) * bs + bs / 2).min(width - 1) as usize;
                let si = by * stride + bx * 4;
                let pi = x * 4;
                row_out[pi..pi + 4].copy_from_slice(&src[si..si + 4]);
            }
        });
    dst
}

/// Square blocks of `scale` pixels, each replaced by the block average.
pub(crate) fn crystallize(src: &[u8], width: u32, height: u32, scale: f64) -> Vec<u8> {
    let bs = scale.max(0.0).round() as u32;
    if bs <= 1 {
        return src.to_vec();
    }

    let blocks_x = width.div_ceil(bs) as usize;
    let blocks_y = height.div_ceil(bs) as usize;
    let mut sums = vec![[0u64; 4]; blocks_x * blocks_y];
    let mut counts = vec![0u64; blocks_x * blocks_y];

    let stride = width as usize * 4;
    for y in 0..height as usize {
        let bi_row = (y as u32 / bs) as usize * blocks_x;
        for x in 0..width as usize {
            let bi = bi_row + (x as u32 / bs) as usize;
            let pi = y * stride + x * 4;
            for c in 0..4 {
                sums[bi][c] += src[pi + c] as u64;
            }
            counts[bi] += 1;
        }
    }

    let averages: Vec<[u8; 4]> = sums
        .iter()
        .zip(&counts)
        .map(|(sum, &n)| {
            let n = n.max(1);
            [
                ((sum[0] + n / 2) / n) as u8,
                ((sum[1] + n / 2) / n) as u8,
                ((sum[2] + n / 2) / n) as u8,
                ((sum[3] + n / 2) / n) as u8,
            ]
        })
        .collect();

    let mut dst = vec![0u8; src.len()];
    dst.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let bi_row = (y as u32 / bs) as usize * blocks_x;
            for x in 0..width as usize {
                let avg = averages[bi_row + (x as u32 / bs) as usize];
                let pi = x * 4;
                row_out[pi..pi + 4].copy_from_slice(&avg);
            }
        });
    dst
}

/// Per-channel Sobel gradient magnitude scaled by `scale`, alpha preserved.
/// Flat regions map to black.
pub(crate) fn edges(src: &[u8], width: u32, height: u32, scale: f64) -> Vec<u8> {
    let gain = scale.max(0.0) as f32;
    let stride = width as usize * 4;
    let w = width as i64;
    let h = height as i64;

    let sample = |x: i64, y: i64, c: usize| -> f32 {
        let sx = x.clamp(0, w - 1) as usize;
        let sy = y.clamp(0, h - 1) as usize;
        src[sy * stride + sx * 4 + c] as f32
    };

    let mut dst = vec![0u8; src.len()];
    dst.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(yy, row_out)| {
            let y = yy as i64;
            for x in 0..w {
                let pi = x as usize * 4;
                for c in 0..3 {
                    let gx = -sample(x - 1, y - 1, c) + sample(x + 1, y - 1, c)
                        - 2.0 * sample(x - 1, y, c)
                        + 2.0 * sample(x + 1, y, c)
                        - sample(x - 1, y + 1, c)
                        + sample(x + 1, y + 1, c);
                    let gy = -sample(x - 1, y - 1, c) - 2.0 * sample(x, y - 1, c)
                        - sample(x + 1, y - 1, c)
                        + sample(x - 1, y + 1, c)
                        + 2.0 * sample(x, y + 1, c)
                        + sample(x + 1, y + 1, c);
                    let mag = (gx * gx + gy * gy).sqrt() * gain;
                    row_out[pi + c] = mag.round().clamp(0.0, 255.0) as u8;
                }
                row_out[pi + 3] = src[yy * stride + pi + 3];
            }
        });
    dst
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> Vec<u32> {
    let sigma = if sigma.is_finite() && sigma > 0.0 {
        sigma as f64
    } else {
        1.0
    };

    let r = radius as i32;
    let denom = 2.0 * sigma * sigma;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    for i in -r..=r {
        let x = i as f64;
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = (((wf / sum) * 65536.0).round() as i64).clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    // Nudge the center tap so the kernel sums to exactly 1.0 in Q16.
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }
    weights
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sx = (x + ki as i32 - radius).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += (kw as u64) * (src[idx + c] as u64);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y + ki as i32 - radius).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += (kw as u64) * (src[idx + c] as u64);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    (((acc + 32768) >> 16).min(255)) as u8
}

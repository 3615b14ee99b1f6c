use anyhow::{anyhow, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Nv12,
}

/// Convert a captured buffer into interleaved RGBA f32, writing into `out`.
pub(crate) fn normalize_to_rgba(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    out: &mut [f32],
) -> Result<()> {
    let count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
    if out.len() != count * 4 {
        return Err(anyhow!(
            "RGBA buffer length mismatch: expected {}, got {}",
            count * 4,
            out.len()
        ));
    }
    match format {
        PixelFormat::Rgb24 => rgb24_to_rgba(pixels, count, out),
        PixelFormat::Nv12 => nv12_to_rgba(pixels, width as usize, height as usize, out),
    }
}

fn rgb24_to_rgba(pixels: &[u8], count: usize, out: &mut [f32]) -> Result<()> {
    if pixels.len() != count * 3 {
        return Err(anyhow!(
            "RGB frame length mismatch: expected {}, got {}",
            count * 3,
            pixels.len()
        ));
    }
    for (src, dst) in pixels.chunks_exact(3).zip(out.chunks_exact_mut(4)) {
        dst[0] = src[0] as f32;
        dst[1] = src[1] as f32;
        dst[2] = src[2] as f32;
        dst[3] = 255.0;
    }
    Ok(())
}

fn nv12_to_rgba(pixels: &[u8], w: usize, h: usize, out: &mut [f32]) -> Result<()> {
    let y_plane = w * h;
    let expected = y_plane + y_plane / 2;
    if pixels.len() != expected {
        return Err(anyhow!(
            "NV12 frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;

            let offset = (j * w + i) * 4;
            out[offset] = clamp_channel(y + 1.402_f32 * v);
            out[offset + 1] = clamp_channel(y - 0.344_136_f32 * u - 0.714_136_f32 * v);
            out[offset + 2] = clamp_channel(y + 1.772_f32 * u);
            out[offset + 3] = 255.0;
        }
    }
    Ok(())
}

fn clamp_channel(value: f32) -> f32 {
    value.round().clamp(0.0, 255.0)
}

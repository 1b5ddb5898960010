//! Xbox texture swizzling: pixels stored in Morton order, bits of `x` and `y`
//! interleaved while both dimensions still have bits left.

use crate::error::{Result, TagError};

/// Linear position of a pixel within a swizzled `width` x `height` image.
pub fn swizzled_offset(mut x: u32, mut y: u32, mut width: u32, mut height: u32) -> usize {
    let mut offset = 0usize;
    let mut shift = 0u32;
    while width > 1 || height > 1 {
        if width > 1 {
            offset |= ((x & 1) as usize) << shift;
            x >>= 1;
            width >>= 1;
            shift += 1;
        }
        if height > 1 {
            offset |= ((y & 1) as usize) << shift;
            y >>= 1;
            height >>= 1;
            shift += 1;
        }
    }
    offset
}

fn check_dimensions(width: u32, height: u32, bytes_per_pixel: usize, len: usize) -> Result<()> {
    if !width.is_power_of_two() || !height.is_power_of_two() {
        return Err(TagError::MalformedInput(format!(
            "swizzled texture must have power of two dimensions, got {}x{}",
            width, height
        )));
    }
    let expected = width as usize * height as usize * bytes_per_pixel;
    if len % expected != 0 {
        return Err(TagError::MalformedInput(format!(
            "swizzled slice data is {} bytes, not a multiple of {}",
            len, expected
        )));
    }
    Ok(())
}

fn remap(pixels: &[u8], width: u32, height: u32, bytes_per_pixel: usize, to_swizzled: bool) -> Result<Vec<u8>> {
    check_dimensions(width, height, bytes_per_pixel, pixels.len())?;
    let slice_len = width as usize * height as usize * bytes_per_pixel;
    let mut out = vec![0u8; pixels.len()];

    // volume slices are swizzled independently
    for (src_slice, dst_slice) in pixels.chunks(slice_len).zip(out.chunks_mut(slice_len)) {
        for y in 0..height {
            for x in 0..width {
                let linear = (y as usize * width as usize + x as usize) * bytes_per_pixel;
                let swizzled = swizzled_offset(x, y, width, height) * bytes_per_pixel;
                let (from, to) = if to_swizzled { (linear, swizzled) } else { (swizzled, linear) };
                dst_slice[to..to + bytes_per_pixel].copy_from_slice(&src_slice[from..from + bytes_per_pixel]);
            }
        }
    }
    Ok(out)
}

pub fn swizzle(pixels: &[u8], width: u32, height: u32, bytes_per_pixel: usize) -> Result<Vec<u8>> {
    remap(pixels, width, height, bytes_per_pixel, true)
}

pub fn unswizzle(pixels: &[u8], width: u32, height: u32, bytes_per_pixel: usize) -> Result<Vec<u8>> {
    remap(pixels, width, height, bytes_per_pixel, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn square_offsets_interleave_bits() {
        assert_eq!(swizzled_offset(0, 0, 4, 4), 0);
        assert_eq!(swizzled_offset(1, 0, 4, 4), 1);
        assert_eq!(swizzled_offset(0, 1, 4, 4), 2);
        assert_eq!(swizzled_offset(1, 1, 4, 4), 3);
        assert_eq!(swizzled_offset(2, 0, 4, 4), 4);
        assert_eq!(swizzled_offset(3, 3, 4, 4), 15);
    }

    #[test]
    fn offsets_are_a_bijection_for_rectangles() {
        for (w, h) in [(8u32, 2u32), (2, 16), (1, 4), (16, 16)] {
            let offsets: HashSet<usize> = (0..h)
                .flat_map(|y| (0..w).map(move |x| swizzled_offset(x, y, w, h)))
                .collect();
            assert_eq!(offsets.len(), (w * h) as usize);
            assert!(offsets.iter().all(|&o| o < (w * h) as usize));
        }
    }

    #[test]
    fn unswizzle_inverts_swizzle() {
        let pixels: Vec<u8> = (0..8 * 4 * 2).map(|i| i as u8).collect();
        let swizzled = swizzle(&pixels, 8, 4, 2).unwrap();
        assert_ne!(swizzled, pixels);
        assert_eq!(unswizzle(&swizzled, 8, 4, 2).unwrap(), pixels);
    }

    #[test]
    fn non_power_of_two_is_rejected() {
        assert!(swizzle(&[0u8; 12], 3, 4, 1).is_err());
    }
}

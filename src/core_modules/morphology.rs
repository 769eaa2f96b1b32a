// THEORY:
// Small, stateless image operators used around the background model: a Gaussian
// pre-filter for raw frames and 3x3 erosion/dilation for the binary foreground
// mask. They are plain functions over `image` buffers so that any segmentation
// backend can share the exact same pre- and post-processing.
//
// Border policy:
// - Smoothing reflects the image at its edges without repeating the edge pixel
//   (`dcb|abcd|cba`).
// - Erosion and dilation ignore neighbors outside the frame, so the frame edge
//   neither erodes nor grows a mask.

use image::{GrayImage, Luma, RgbImage};

pub const MASK_ON: u8 = 255;
pub const MASK_OFF: u8 = 0;

/// Builds a normalized 1D Gaussian kernel of odd length `size`.
fn gaussian_kernel(size: u32) -> Vec<f32> {
    let size = size.max(1) | 1;
    if size == 1 {
        return vec![1.0];
    }
    if size == 5 {
        return vec![0.0625, 0.25, 0.375, 0.25, 0.0625];
    }
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as i32;
    let mut kernel: Vec<f32> = (-half..=half)
        .map(|i| (-(i * i) as f32 / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}

/// Reflect-101 index into `0..len`.
fn reflect(index: i64, len: i64) -> u32 {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - i;
    }
    i as u32
}

/// Separable Gaussian smoothing with a `kernel_size` x `kernel_size` window.
pub fn gaussian_smooth(frame: &RgbImage, kernel_size: u32) -> RgbImage {
    let kernel = gaussian_kernel(kernel_size);
    if kernel.len() == 1 {
        return frame.clone();
    }
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return frame.clone();
    }
    let half = (kernel.len() / 2) as i64;

    // Horizontal pass into a float buffer, vertical pass back into bytes.
    let mut horizontal = vec![[0f32; 3]; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let mut acc = [0f32; 3];
            for (k, weight) in kernel.iter().enumerate() {
                let sx = reflect(x as i64 + k as i64 - half, width as i64);
                let px = frame.get_pixel(sx, y).0;
                for c in 0..3 {
                    acc[c] += weight * px[c] as f32;
                }
            }
            horizontal[(y * width + x) as usize] = acc;
        }
    }

    let mut out = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut acc = [0f32; 3];
            for (k, weight) in kernel.iter().enumerate() {
                let sy = reflect(y as i64 + k as i64 - half, height as i64);
                let px = horizontal[(sy * width + x) as usize];
                for c in 0..3 {
                    acc[c] += weight * px[c];
                }
            }
            let pixel = out.get_pixel_mut(x, y);
            for c in 0..3 {
                pixel.0[c] = acc[c].round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

/// One 3x3 min (erode) or max (dilate) pass over a binary mask.
fn morph_pass(mask: &GrayImage, erode: bool) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut value = if erode { u8::MAX } else { u8::MIN };
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }
                    let v = mask.get_pixel(nx as u32, ny as u32).0[0];
                    value = if erode { value.min(v) } else { value.max(v) };
                }
            }
            out.put_pixel(x, y, Luma([value]));
        }
    }
    out
}

pub fn erode(mask: &GrayImage, iterations: u32) -> GrayImage {
    (0..iterations).fold(mask.clone(), |m, _| morph_pass(&m, true))
}

pub fn dilate(mask: &GrayImage, iterations: u32) -> GrayImage {
    (0..iterations).fold(mask.clone(), |m, _| morph_pass(&m, false))
}

/// Counts nonzero mask pixels in `x0..x1`, `y0..y1`.
pub fn count_nonzero_in(mask: &GrayImage, (x0, y0, x1, y1): (u32, u32, u32, u32)) -> u64 {
    let x1 = x1.min(mask.width());
    let y1 = y1.min(mask.height());
    let mut count = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            if mask.get_pixel(x, y).0[0] != MASK_OFF {
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn mask_with(width: u32, height: u32, on: &[(u32, u32)]) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        for &(x, y) in on {
            mask.put_pixel(x, y, Luma([MASK_ON]));
        }
        mask
    }

    #[test]
    fn kernel_is_normalized() {
        for size in [3, 5, 7, 9] {
            let sum: f32 = gaussian_kernel(size).iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "size {size} sums to {sum}");
        }
    }

    #[test]
    fn smoothing_keeps_flat_frames_flat() {
        let frame = RgbImage::from_pixel(8, 6, Rgb([40, 120, 200]));
        let smoothed = gaussian_smooth(&frame, 5);
        assert_eq!(smoothed, frame);
    }

    #[test]
    fn smoothing_spreads_a_spike() {
        let mut frame = RgbImage::new(9, 9);
        frame.put_pixel(4, 4, Rgb([255, 255, 255]));
        let smoothed = gaussian_smooth(&frame, 5);
        let center = smoothed.get_pixel(4, 4).0[0];
        let neighbor = smoothed.get_pixel(5, 4).0[0];
        assert!(center < 255 && center > neighbor && neighbor > 0);
    }

    #[test]
    fn erosion_removes_speckle() {
        let mask = mask_with(10, 10, &[(5, 5)]);
        assert_eq!(count_nonzero_in(&erode(&mask, 1), (0, 0, 10, 10)), 0);
    }

    #[test]
    fn dilation_grows_by_one_ring_per_iteration() {
        let mask = mask_with(11, 11, &[(5, 5)]);
        assert_eq!(count_nonzero_in(&dilate(&mask, 1), (0, 0, 11, 11)), 9);
        assert_eq!(count_nonzero_in(&dilate(&mask, 2), (0, 0, 11, 11)), 25);
    }

    #[test]
    fn frame_edge_does_not_erode() {
        let full = GrayImage::from_pixel(4, 4, Luma([MASK_ON]));
        assert_eq!(erode(&full, 2), full);
    }

    #[test]
    fn count_is_limited_to_the_window() {
        let mask = mask_with(6, 6, &[(0, 0), (2, 2), (3, 3), (5, 5)]);
        assert_eq!(count_nonzero_in(&mask, (2, 2, 4, 4)), 2);
        assert_eq!(count_nonzero_in(&mask, (0, 0, 100, 100)), 4);
    }
}

use image::GrayImage;
use itertools::iproduct;

/// Reflects an out-of-range coordinate back into `0..len` without repeating the edge pixel.
fn reflect101(v: i64, len: i64) -> u32 {
    if len == 1 {
        return 0;
    }
    let r = if v < 0 {
        -v
    } else if v >= len {
        2 * len - v - 2
    } else {
        v
    };
    r.clamp(0, len - 1) as u32
}

/// Second-derivative response of a grey image using the 4-neighbour kernel
/// `[0 1 0; 1 -4 1; 0 1 0]`, one value per pixel in row-major order.
pub fn laplacian(img: &GrayImage) -> Vec<f64> {
    let (width, height) = img.dimensions();
    let (w, h) = (width as i64, height as i64);
    if width == 0 || height == 0 {
        return vec![];
    }

    iproduct!(0..h, 0..w)
        .map(|(y, x)| {
            let px = |xx: i64, yy: i64| img.get_pixel(reflect101(xx, w), reflect101(yy, h))[0] as f64;
            px(x, y - 1) + px(x, y + 1) + px(x - 1, y) + px(x + 1, y) - 4.0 * px(x, y)
        })
        .collect()
}

pub fn variance<I: Iterator<Item = f64>>(values: I) -> f64 {
    let (count, sum, sum_sq) = values.fold((0usize, 0.0, 0.0), |(n, s, sq), v| {
        (n + 1, s + v, sq + v * v)
    });
    if count == 0 {
        return 0.0;
    }
    let mean = sum / count as f64;
    (sum_sq / count as f64 - mean * mean).max(0.0)
}

/// Laplacian variance over the whole frame. Higher is sharper.
pub fn laplacian_variance(img: &GrayImage) -> f64 {
    variance(laplacian(img).into_iter())
}

/// Laplacian variance restricted to pixels where `mask` is true, so a mostly empty background
/// cannot drag the score down.
pub fn masked_laplacian_variance(img: &GrayImage, mask: &[bool]) -> f64 {
    variance(
        laplacian(img)
            .into_iter()
            .zip(mask.iter())
            .filter(|(_, m)| **m)
            .map(|(v, _)| v),
    )
}

/// Pixels whose grey level is strictly above `floor`, in row-major order.
pub fn content_mask(img: &GrayImage, floor: u8) -> Vec<bool> {
    img.pixels().map(|p| p[0] > floor).collect()
}

use image::imageops::FilterType;
use image::RgbImage;

pub const HUE_BINS: usize = 50;
pub const SAT_BINS: usize = 60;

/// Converts an 8-bit RGB triple to 8-bit HSV with hue halved into `0..180`, the convention the
/// UI colour bands are expressed in.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta / max * 255.0 } else { 0.0 };
    let h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    ((h / 2.0).round().min(179.0) as u8, s.round() as u8, v as u8)
}

/// 2D hue x saturation histogram of a frame downscaled to `size` x `size`.
#[derive(Debug, Clone)]
pub struct HueSatHistogram {
    bins: Vec<f64>,
}

impl HueSatHistogram {
    pub fn from_image(img: &RgbImage, size: u32) -> Self {
        let small = image::imageops::resize(img, size, size, FilterType::Triangle);
        let mut bins = vec![0.0; HUE_BINS * SAT_BINS];
        small.pixels().for_each(|p| {
            let (h, s, _) = rgb_to_hsv(p[0], p[1], p[2]);
            let hb = (h as usize * HUE_BINS / 180).min(HUE_BINS - 1);
            let sb = (s as usize * SAT_BINS / 256).min(SAT_BINS - 1);
            bins[hb * SAT_BINS + sb] += 1.0;
        });
        HueSatHistogram { bins }
    }

    /// Pearson correlation between two histograms, in `-1.0..=1.0`. Two constant histograms
    /// correlate perfectly.
    pub fn correlation(&self, other: &HueSatHistogram) -> f64 {
        let n = self.bins.len() as f64;
        let mean_a = self.bins.iter().sum::<f64>() / n;
        let mean_b = other.bins.iter().sum::<f64>() / n;

        let (num, sa, sb) = self
            .bins
            .iter()
            .zip(other.bins.iter())
            .fold((0.0, 0.0, 0.0), |(num, sa, sb), (a, b)| {
                let da = a - mean_a;
                let db = b - mean_b;
                (num + da * db, sa + da * da, sb + db * db)
            });

        let denom = sa * sb;
        if denom.abs() > f64::EPSILON {
            num / denom.sqrt()
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), (0, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 255), (120, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 0), (0, 0, 0));
    }

    #[test]
    fn test_identical_frames_correlate() {
        let img = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 90]));
        let a = HueSatHistogram::from_image(&img, 32);
        let b = HueSatHistogram::from_image(&img, 32);
        assert!((a.correlation(&b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_different_frames_do_not_correlate() {
        let red = RgbImage::from_pixel(32, 32, Rgb([220, 10, 10]));
        let blue = RgbImage::from_pixel(32, 32, Rgb([10, 10, 220]));
        let a = HueSatHistogram::from_image(&red, 16);
        let b = HueSatHistogram::from_image(&blue, 16);
        assert!(a.correlation(&b) < 0.5);
    }
}

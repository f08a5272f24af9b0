use crate::config::FilterConfig;
use crate::histogram::rgb_to_hsv;
use image::RgbImage;
use serde::Serialize;

/// Hue/saturation/value ranges (hue in `0..180`) of the editor's blue and orange accent colours.
const UI_COLOR_BANDS: [((u8, u8, u8), (u8, u8, u8)); 2] = [
    ((100, 100, 100), (130, 255, 255)),
    ((10, 100, 100), (25, 255, 255)),
];

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OverlayMeasurement {
    pub edge_ratio: f64,
    pub color_ratio: f64,
}

fn in_band(hsv: (u8, u8, u8), band: &((u8, u8, u8), (u8, u8, u8))) -> bool {
    let ((hl, sl, vl), (hh, sh, vh)) = *band;
    (hl..=hh).contains(&hsv.0) && (sl..=sh).contains(&hsv.1) && (vl..=vh).contains(&hsv.2)
}

/// Measures edge density and accent colour coverage across the top band of a frame.
pub fn measure_overlay(image: &RgbImage, config: &FilterConfig) -> OverlayMeasurement {
    let (width, height) = image.dimensions();
    let band_height = ((height as f64 * config.ui_region_fraction) as u32).min(height);
    if width == 0 || band_height == 0 {
        return OverlayMeasurement::default();
    }

    let top = image::imageops::crop_imm(image, 0, 0, width, band_height).to_image();
    let total = (width * band_height) as f64;

    let gray = image::imageops::grayscale(&top);
    let edges = imageproc::edges::canny(&gray, config.canny_low, config.canny_high);
    let edge_pixels = edges.pixels().filter(|p| p[0] > 0).count();

    let color_pixels: usize = top
        .pixels()
        .map(|p| {
            let hsv = rgb_to_hsv(p[0], p[1], p[2]);
            UI_COLOR_BANDS.iter().filter(|b| in_band(hsv, b)).count()
        })
        .sum();

    OverlayMeasurement {
        edge_ratio: edge_pixels as f64 / total,
        color_ratio: color_pixels as f64 / total,
    }
}

pub fn has_ui_overlay(image: &RgbImage, config: &FilterConfig) -> bool {
    let m = measure_overlay(image, config);
    m.edge_ratio > config.ui_edge_threshold || m.color_ratio > config.ui_color_threshold
}

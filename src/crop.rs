use crate::frame::{list_frames, Frame};
use anyhow::Result;
use image::{GrayImage, Luma, Rgb, RgbImage};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Rectangle applied to every frame of a batch. `x2`/`y2` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRegion {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropRegion {
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// Inclusive bounding box of content pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentBounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl ContentBounds {
    pub fn union(&self, other: &ContentBounds) -> ContentBounds {
        ContentBounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CropReport {
    pub region: CropRegion,
    pub original_width: u32,
    pub original_height: u32,
    pub cropped_width: u32,
    pub cropped_height: u32,
    pub reduction_pct: f64,
    pub frames_cropped: usize,
    pub output_dir: PathBuf,
}

pub fn content_bounds(img: &GrayImage, floor: u8) -> Option<ContentBounds> {
    img.enumerate_pixels()
        .filter(|(_, _, p)| p[0] > floor)
        .fold(None, |acc: Option<ContentBounds>, (x, y, _)| {
            let b = ContentBounds {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            };
            Some(match acc {
                Some(a) => a.union(&b),
                None => b,
            })
        })
}

/// Per-frame result of the read-only scan: the content box (if any) and the frame dimensions.
type ScanEntry = (Option<ContentBounds>, (u32, u32));

fn scan_frame(frame: &Frame, floor: u8) -> Option<ScanEntry> {
    match image::open(&frame.path) {
        Ok(img) => {
            let gray = img.to_luma8();
            let dims = gray.dimensions();
            Some((content_bounds(&gray, floor), dims))
        }
        Err(why) => {
            warn!("Skipping unreadable frame {:?} during crop scan: {}", frame.path, why);
            None
        }
    }
}

/// Inflates a union box by `padding` of its own width and height on each axis and clamps it to
/// `width` x `height`. The inclusive content box becomes an exclusive region, so every content
/// pixel survives even with no padding. Degenerate boxes yield `None`.
pub fn region_from_bounds(
    bounds: &ContentBounds,
    padding: f64,
    width: u32,
    height: u32,
) -> Option<CropRegion> {
    if bounds.min_x >= bounds.max_x || bounds.min_y >= bounds.max_y {
        return None;
    }
    let pad_x = ((bounds.max_x - bounds.min_x) as f64 * padding) as u32;
    let pad_y = ((bounds.max_y - bounds.min_y) as f64 * padding) as u32;

    let region = CropRegion {
        x1: bounds.min_x.saturating_sub(pad_x),
        y1: bounds.min_y.saturating_sub(pad_y),
        x2: (bounds.max_x + 1 + pad_x).min(width),
        y2: (bounds.max_y + 1 + pad_y).min(height),
    };
    if region.x1 >= region.x2 || region.y1 >= region.y2 {
        None
    } else {
        Some(region)
    }
}

/// Pass 1. Scans every frame and returns the padded union of their content boxes, or `None`
/// when no frame has content above `floor`. Nothing is written.
pub fn compute_region(frames: &[Frame], floor: u8, padding: f64) -> Option<(CropRegion, (u32, u32))> {
    let (bounds, dims) = frames
        .par_iter()
        .filter_map(|f| scan_frame(f, floor))
        .map(|(b, d)| (b, Some(d)))
        .reduce(
            || (None, None),
            |(ba, da), (bb, db)| {
                let bounds = match (ba, bb) {
                    (Some(a), Some(b)) => Some(a.union(&b)),
                    (a, b) => a.or(b),
                };
                // Clamp against the smallest frame so the region fits every one of them
                let dims = match (da, db) {
                    (Some((wa, ha)), Some((wb, hb))) => Some((wa.min(wb), ha.min(hb))),
                    (a, b) => a.or(b),
                };
                (bounds, dims)
            },
        );

    let (width, height) = dims?;
    let bounds = bounds?;
    region_from_bounds(&bounds, padding, width, height).map(|r| (r, (width, height)))
}

/// Pass 2. Crops every frame to `region`, overwriting in place when `output_dir` is `None`.
/// Returns the number of frames written.
pub fn apply_region(frames: &[Frame], region: &CropRegion, output_dir: Option<&Path>) -> Result<usize> {
    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)?;
    }

    let written = frames
        .par_iter()
        .map(|frame| -> Result<bool> {
            let img = match image::open(&frame.path) {
                Ok(img) => img,
                Err(why) => {
                    warn!("Unable to crop {:?}: {}", frame.path, why);
                    return Ok(false);
                }
            };
            let cropped = img.crop_imm(region.x1, region.y1, region.width(), region.height());
            let target = match output_dir {
                Some(dir) => dir.join(frame.file_name()),
                None => frame.path.clone(),
            };
            cropped.save(&target)?;
            Ok(true)
        })
        .collect::<Result<Vec<bool>>>()?;

    Ok(written.into_iter().filter(|w| *w).count())
}

/// Computes the batch-wide crop region for `frames_dir` and applies it. Returns `None` when the
/// crop was skipped because no content was found.
pub fn crop_frames(
    frames_dir: &Path,
    floor: u8,
    padding: f64,
    output_dir: Option<&Path>,
) -> Result<Option<CropReport>> {
    let frames = list_frames(frames_dir)?;
    info!("Scanning {} frames for content bounds", frames.len());

    let (region, (width, height)) = match compute_region(&frames, floor, padding) {
        Some(r) => r,
        None => {
            warn!("No content found above grey level {}, skipping crop", floor);
            return Ok(None);
        }
    };

    info!(
        "Cropping to x {}..{}, y {}..{} ({}x{} -> {}x{})",
        region.x1,
        region.x2,
        region.y1,
        region.y2,
        width,
        height,
        region.width(),
        region.height()
    );
    let frames_cropped = apply_region(&frames, &region, output_dir)?;

    let original_area = (width as f64) * (height as f64);
    let cropped_area = (region.width() as f64) * (region.height() as f64);
    Ok(Some(CropReport {
        region,
        original_width: width,
        original_height: height,
        cropped_width: region.width(),
        cropped_height: region.height(),
        reduction_pct: (1.0 - cropped_area / original_area) * 100.0,
        frames_cropped,
        output_dir: output_dir.unwrap_or(frames_dir).to_path_buf(),
    }))
}

/// Paints every content pixel white so the content floor can be judged by eye.
pub fn content_mask_preview(frame: &RgbImage, floor: u8) -> RgbImage {
    let gray = image::imageops::grayscale(frame);
    RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > floor {
            Rgb([255, 255, 255])
        } else {
            *frame.get_pixel(x, y)
        }
    })
}

/// Forces every pixel at or below the content floor to pure black.
pub fn black_out_background(frame: &RgbImage, floor: u8) -> RgbImage {
    let gray = image::imageops::grayscale(frame);
    RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > floor {
            *frame.get_pixel(x, y)
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// Writes background-cleaned copies of every frame in `input_dir` into `output_dir`.
pub fn mask_artifacts(input_dir: &Path, output_dir: &Path, floor: u8) -> Result<usize> {
    let frames = list_frames(input_dir)?;
    std::fs::create_dir_all(output_dir)?;
    let written = frames
        .par_iter()
        .map(|frame| -> Result<bool> {
            match image::open(&frame.path) {
                Ok(img) => {
                    black_out_background(&img.to_rgb8(), floor)
                        .save(output_dir.join(frame.file_name()))?;
                    Ok(true)
                }
                Err(why) => {
                    warn!("Unable to mask {:?}: {}", frame.path, why);
                    Ok(false)
                }
            }
        })
        .collect::<Result<Vec<bool>>>()?;
    Ok(written.into_iter().filter(|w| *w).count())
}

pub fn content_mask_image(gray: &GrayImage, floor: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > floor {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

use crate::command::{run_checked, ToolCommand, ToolRunner};
use crate::crop::content_mask_image;
use crate::error::PipelineError;
use crate::frame::{list_frames, Frame};
use crate::stats::SegmentStats;
use anyhow::{anyhow, Result};
use image::{GrayImage, Luma, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const SUPPORTED_MODELS: [&str; 3] = ["u2net", "u2net_human_seg", "isnet-general-use"];

pub fn validate_model(model_name: &str) -> Result<&str> {
    if SUPPORTED_MODELS.contains(&model_name) {
        Ok(model_name)
    } else {
        Err(PipelineError::validation("segmentation model", model_name, &SUPPORTED_MODELS).into())
    }
}

/// Isolates the subject of a frame. Implementations return an alpha mask the size of the frame,
/// 255 for foreground and 0 for background.
#[async_trait::async_trait]
pub trait BackgroundSegmenter: Send + Sync {
    async fn foreground_mask(&self, frame_path: &Path, image: &RgbImage) -> Result<GrayImage>;
}

/// Treats everything brighter than a grey floor as foreground. Good enough for captures on an
/// empty black backdrop and needs no model.
#[derive(Debug, Clone)]
pub struct LuminanceSegmenter {
    pub floor: u8,
}

#[async_trait::async_trait]
impl BackgroundSegmenter for LuminanceSegmenter {
    async fn foreground_mask(&self, _frame_path: &Path, image: &RgbImage) -> Result<GrayImage> {
        Ok(content_mask_image(
            &image::imageops::grayscale(image),
            self.floor,
        ))
    }
}

/// Delegates to the `rembg` command line tool, reading the alpha channel of its RGBA output.
pub struct RembgSegmenter {
    runner: Arc<dyn ToolRunner>,
    program: PathBuf,
    model: String,
}

impl RembgSegmenter {
    pub fn new(runner: Arc<dyn ToolRunner>, program: &Path, model: &str) -> Result<Self> {
        Ok(RembgSegmenter {
            runner,
            program: program.to_path_buf(),
            model: validate_model(model)?.to_owned(),
        })
    }
}

#[async_trait::async_trait]
impl BackgroundSegmenter for RembgSegmenter {
    async fn foreground_mask(&self, frame_path: &Path, _image: &RgbImage) -> Result<GrayImage> {
        let scratch = tempfile::tempdir()?;
        let out_path = scratch.path().join("foreground.png");
        run_checked(
            self.runner.as_ref(),
            &ToolCommand::new("segment", &self.program)
                .arg("i")
                .arg("-m")
                .arg(&self.model)
                .arg(frame_path.to_string_lossy())
                .arg(out_path.to_string_lossy()),
        )
        .await?;

        let rgba = image::open(&out_path)?.to_rgba8();
        Ok(GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            Luma([rgba.get_pixel(x, y)[3]])
        }))
    }
}

/// Blends the frame over a solid background using the mask as alpha.
pub fn composite(image: &RgbImage, mask: &GrayImage, background: [u8; 3]) -> Result<RgbImage> {
    if image.dimensions() != mask.dimensions() {
        return Err(anyhow!(
            "Mask size {:?} does not match frame size {:?}",
            mask.dimensions(),
            image.dimensions()
        ));
    }
    Ok(RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let a = mask.get_pixel(x, y)[0] as f32 / 255.0;
        let fg = image.get_pixel(x, y);
        let blend = |c: usize| (fg[c] as f32 * a + background[c] as f32 * (1.0 - a)).round() as u8;
        Rgb([blend(0), blend(1), blend(2)])
    }))
}

async fn segment_one(
    segmenter: &dyn BackgroundSegmenter,
    frame: &Frame,
    background: [u8; 3],
) -> Result<(RgbImage, GrayImage)> {
    let image = image::open(&frame.path)?.to_rgb8();
    let mask = segmenter.foreground_mask(&frame.path, &image).await?;
    let result = composite(&image, &mask, background)?;
    Ok((result, mask))
}

/// Replaces the background of every frame in `input_dir`, writing the results (and optionally
/// the masks, under `masks/`) to `output_dir`. Frames that fail are counted and skipped.
pub async fn segment_frames<F>(
    segmenter: &dyn BackgroundSegmenter,
    input_dir: &Path,
    output_dir: &Path,
    background: [u8; 3],
    save_masks: bool,
    on_frame_checked: F,
) -> Result<SegmentStats>
where
    F: Fn(&Frame) + Send + Sync,
{
    let frames = list_frames(input_dir)?;
    std::fs::create_dir_all(output_dir)?;
    let mask_dir = output_dir.join("masks");
    if save_masks {
        std::fs::create_dir_all(&mask_dir)?;
    }
    info!("Segmenting {} frames, background {:?}", frames.len(), background);

    let mut stats = SegmentStats {
        total: frames.len(),
        ..Default::default()
    };

    for frame in frames.iter() {
        match segment_one(segmenter, frame, background).await {
            Ok((result, mask)) => {
                result.save(output_dir.join(frame.file_name()))?;
                if save_masks {
                    mask.save(mask_dir.join(frame.file_name()))?;
                }
                stats.processed += 1;
            }
            Err(why) => {
                warn!("Error segmenting {}: {}", frame.file_name(), why);
                stats.errors += 1;
            }
        }
        on_frame_checked(frame);
    }

    Ok(stats)
}

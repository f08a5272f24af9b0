use anyhow::Result;
use dreamscan::config::{self, DreamscanConfig};
use dreamscan::mode::ReconstructionMode;
use std::path::PathBuf;

#[test]
fn test_config_parse() -> Result<()> {
    let testfile = PathBuf::from("tests/testdata/dreamscan.toml");
    let config = config::load_config(&testfile)?;

    assert!(!config.filter.skip_ui);
    assert!(config.filter.skip_duplicates);
    assert_eq!(config.filter.histogram_size, 128);
    assert_eq!(config.filter.min_blur_score_for(ReconstructionMode::Splat), 12.5);
    assert_eq!(config.filter.duplicate_threshold_for(ReconstructionMode::Splat), 0.98);

    assert_eq!(config.crop.content_floor, 6);
    assert_eq!(config.crop.padding, 0.10);
    assert!(!config.crop.in_place);

    assert_eq!(config.reconstruction.vram_floor_mb, 6000);
    assert_eq!(config.reconstruction.project_root, Some(PathBuf::from("/opt/dreamscan")));
    assert_eq!(config.reconstruction.small_batch_frames, 200);

    assert_eq!(config.segment.model, "isnet-general-use");
    assert_eq!(config.segment.background, [255, 255, 255]);
    assert!(config.segment.save_masks);

    assert_eq!(config.pipeline.completion_count, 250);
    assert_eq!(config.pipeline.extract_every_n, 2);
    assert!(config.pipeline.mask_artifacts);
    assert_eq!(config.detail.sample_count, 10);
    Ok(())
}

#[test]
fn test_missing_config_file() {
    assert!(config::load_config(&PathBuf::from("tests/testdata/nope.toml")).is_err());
}

#[test]
fn test_defaults_without_file() -> Result<()> {
    let config = config::load_or_default(&None)?;
    let defaults = DreamscanConfig::default();
    assert_eq!(config.pipeline.completion_count, defaults.pipeline.completion_count);
    assert_eq!(config.pipeline.completion_count, 100);
    assert_eq!(config.reconstruction.vram_floor_mb, 3000);
    assert_eq!(config.segment.model, "u2net");
    Ok(())
}

#[test]
fn test_mode_names() -> Result<()> {
    assert_eq!(ReconstructionMode::from("Splat")?, ReconstructionMode::Splat);
    assert_eq!(ReconstructionMode::from("nerf")?, ReconstructionMode::Nerf);
    let err = ReconstructionMode::from("voxels").unwrap_err();
    assert!(err.to_string().contains("meshroom, splat, nerf"));
    Ok(())
}

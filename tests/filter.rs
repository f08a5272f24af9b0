mod common;

use anyhow::Result;
use common::*;
use dreamscan::config::FilterConfig;
use dreamscan::filter::{
    filter_frames, DropReason, FilterOutcome, FilterVerdict, FrameFilter, LastKept,
    MANIFEST_FILE_NAME,
};
use dreamscan::frame::{count_frames, list_frames};
use dreamscan::mode::ReconstructionMode;
use std::cell::RefCell;
use std::path::Path;

const RED: [u8; 3] = [255, 0, 0];
const GREEN: [u8; 3] = [0, 255, 0];

fn run_filter(filter: &FrameFilter, input: &Path, output: &Path) -> Result<Vec<FilterVerdict>> {
    let verdicts = RefCell::new(vec![]);
    filter_frames(filter, input, output, |outcome: &FilterOutcome| {
        verdicts.borrow_mut().push(outcome.verdict);
    })?;
    Ok(verdicts.into_inner())
}

#[test]
fn test_filter_tallies_every_drop_reason() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raw = dir.path().join("raw_frames");
    let clean = dir.path().join("clean_frames");

    write_frames(
        &raw,
        &[
            checker_frame(RED),
            checker_frame(RED),
            flat_frame(128),
            flat_frame(0),
            overlay_frame(),
            checker_frame(GREEN),
            checker_frame(RED),
        ],
    )?;
    // Not an image at all
    std::fs::write(frame_path(&raw, 3), b"definitely not a png")?;

    let filter = FrameFilter::new(&FilterConfig::default(), ReconstructionMode::Meshroom);
    let verdicts = run_filter(&filter, &raw, &clean)?;

    assert_eq!(
        verdicts,
        vec![
            FilterVerdict::Kept,
            FilterVerdict::Dropped(DropReason::Duplicate),
            FilterVerdict::Dropped(DropReason::Blur),
            FilterVerdict::Dropped(DropReason::ReadError),
            FilterVerdict::Dropped(DropReason::UiOverlay),
            FilterVerdict::Kept,
            FilterVerdict::Kept,
        ]
    );

    assert_eq!(count_frames(&clean), 3);
    assert!(frame_path(&clean, 0).exists());
    assert!(!frame_path(&clean, 3).exists());
    assert!(frame_path(&clean, 5).exists());
    assert!(frame_path(&clean, 6).exists());
    Ok(())
}

#[test]
fn test_manifest_lists_survivors() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raw = dir.path().join("raw_frames");
    let clean = dir.path().join("clean_frames");
    write_frames(&raw, &[checker_frame(RED), flat_frame(128), checker_frame(GREEN)])?;

    let filter = FrameFilter::new(&FilterConfig::default(), ReconstructionMode::Meshroom);
    let stats = filter_frames(&filter, &raw, &clean, |_| {})?;
    assert_eq!(stats.total, 3);
    assert_eq!(stats.kept, 2);
    assert_eq!(stats.blur_filtered, 1);

    let manifest = std::fs::read_to_string(clean.join(MANIFEST_FILE_NAME))?;
    assert!(manifest.contains("# Total: 2 frames"));
    assert!(manifest.contains("# Blur filtered: 1"));
    let names = manifest
        .lines()
        .filter(|l| !l.starts_with('#') && !l.is_empty())
        .collect::<Vec<&str>>();
    assert_eq!(names, vec!["frame_000000.png", "frame_000002.png"]);
    Ok(())
}

#[test]
fn test_dropped_frame_does_not_move_duplicate_anchor() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raw = dir.path().join("raw_frames");
    let clean = dir.path().join("clean_frames");
    write_frames(&raw, &[checker_frame(RED), flat_frame(128), checker_frame(RED)])?;

    let filter = FrameFilter::new(&FilterConfig::default(), ReconstructionMode::Meshroom);
    let verdicts = run_filter(&filter, &raw, &clean)?;
    assert_eq!(
        verdicts,
        vec![
            FilterVerdict::Kept,
            FilterVerdict::Dropped(DropReason::Blur),
            FilterVerdict::Dropped(DropReason::Duplicate),
        ]
    );
    Ok(())
}

#[test]
fn test_duplicate_check_can_be_disabled() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raw = dir.path().join("raw_frames");
    let clean = dir.path().join("clean_frames");
    write_frames(&raw, &[checker_frame(RED), checker_frame(RED)])?;

    let config = FilterConfig {
        skip_duplicates: false,
        ..Default::default()
    };
    let filter = FrameFilter::new(&config, ReconstructionMode::Meshroom);
    let verdicts = run_filter(&filter, &raw, &clean)?;
    assert_eq!(verdicts, vec![FilterVerdict::Kept, FilterVerdict::Kept]);
    Ok(())
}

#[test]
fn test_duplicates_compare_against_last_kept() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raw = dir.path().join("raw_frames");
    let clean = dir.path().join("clean_frames");
    // Half red, then a quarter red and a quarter green, then half green. Each neighbouring pair
    // correlates well above 0.75; the two ends correlate near 0.5.
    write_frames(
        &raw,
        &[
            banded_frame(&[(48, RED)]),
            banded_frame(&[(24, RED), (24, GREEN)]),
            banded_frame(&[(48, GREEN)]),
        ],
    )?;

    let config = FilterConfig {
        skip_ui: false,
        min_blur_score: Some(0.0),
        duplicate_threshold: Some(0.75),
        ..Default::default()
    };
    let filter = FrameFilter::new(&config, ReconstructionMode::Meshroom);
    let verdicts = run_filter(&filter, &raw, &clean)?;
    assert_eq!(
        verdicts,
        vec![
            FilterVerdict::Kept,
            FilterVerdict::Dropped(DropReason::Duplicate),
            FilterVerdict::Kept,
        ]
    );

    // Judged against the dropped middle frame instead, the last one would have gone too
    let frames = list_frames(&raw)?;
    let (verdict, _, middle) = filter.evaluate(&frames[1], &LastKept::default());
    assert_eq!(verdict, FilterVerdict::Kept);
    let anchored_on_middle = LastKept::default().keep(middle.unwrap());
    let (verdict, _, _) = filter.evaluate(&frames[2], &anchored_on_middle);
    assert_eq!(verdict, FilterVerdict::Dropped(DropReason::Duplicate));
    Ok(())
}

#[test]
fn test_mode_thresholds() -> Result<()> {
    let config = FilterConfig::default();

    let mesh = FrameFilter::new(&config, ReconstructionMode::Meshroom);
    assert_eq!(mesh.min_blur_score, 5.0);
    assert_eq!(mesh.duplicate_threshold, 0.95);

    let splat = FrameFilter::new(&config, ReconstructionMode::Splat);
    assert_eq!(splat.min_blur_score, 2.0);
    assert_eq!(splat.duplicate_threshold, 0.98);

    let overridden = FrameFilter::new(
        &FilterConfig {
            min_blur_score: Some(40.0),
            ..Default::default()
        },
        ReconstructionMode::Nerf,
    );
    assert_eq!(overridden.min_blur_score, 40.0);
    assert_eq!(overridden.duplicate_threshold, 0.98);
    Ok(())
}

#[test]
fn test_empty_input_yields_empty_manifest() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let filter = FrameFilter::new(&FilterConfig::default(), ReconstructionMode::Meshroom);
    let stats = filter_frames(
        &filter,
        &dir.path().join("missing"),
        &dir.path().join("clean_frames"),
        |_| {},
    )?;
    assert_eq!(stats.total, 0);
    assert!(dir.path().join("clean_frames").join(MANIFEST_FILE_NAME).exists());
    Ok(())
}

mod common;

use anyhow::Result;
use common::*;
use dreamscan::accel::AcceleratorInfo;
use dreamscan::command::{ToolCommand, ToolOutput};
use dreamscan::config::DreamscanConfig;
use dreamscan::error::PipelineError;
use dreamscan::mode::ReconstructionMode;
use dreamscan::probe::{ProbeSource, ToolProbe};
use dreamscan::reconstruct::{
    select_largest_model, DenseSkip, ReconstructOptions, ReconstructionOutcome, Reconstructor,
    RESULT_FILE_NAME,
};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn textured_frame() -> RgbImage {
    RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        let v = ((x * 7919 + y * 104729) % 200 + 30) as u8;
        Rgb([v, v, v])
    })
}

struct Fixture {
    _dir: tempfile::TempDir,
    frames_dir: PathBuf,
    output_dir: PathBuf,
    colmap_bin: PathBuf,
    meshroom_bin: PathBuf,
}

impl Fixture {
    fn new(frame_count: usize) -> Result<Fixture> {
        let dir = tempfile::tempdir()?;
        let frames_dir = dir.path().join("frames");
        let frames = (0..frame_count).map(|_| textured_frame()).collect::<Vec<_>>();
        write_frames(&frames_dir, &frames)?;
        std::fs::create_dir_all(&frames_dir)?;

        let bin_dir = dir.path().join("bin");
        std::fs::create_dir_all(&bin_dir)?;
        let colmap_bin = bin_dir.join("colmap");
        let meshroom_bin = bin_dir.join("meshroom_batch");
        std::fs::write(&colmap_bin, "")?;
        std::fs::write(&meshroom_bin, "")?;

        Ok(Fixture {
            output_dir: dir.path().join("project"),
            frames_dir,
            colmap_bin,
            meshroom_bin,
            _dir: dir,
        })
    }

    fn reconstructor(&self, runner: Arc<FakeRunner>, colmap: bool, meshroom: bool) -> Reconstructor {
        let probe = |tool: &str, path: &Path, found: bool| {
            let sources = if found {
                vec![ProbeSource::Fixed(path.to_path_buf())]
            } else {
                vec![]
            };
            ToolProbe::new(tool, sources)
        };
        Reconstructor::new(runner, &DreamscanConfig::default()).with_probes(
            probe("colmap", &self.colmap_bin, colmap),
            probe("meshroom_batch", &self.meshroom_bin, meshroom),
        )
    }
}

fn gpu(vram_mb: u64) -> Option<AcceleratorInfo> {
    Some(AcceleratorInfo {
        has_accelerator: true,
        vram_mb,
        name: "NVIDIA GeForce RTX 3060".to_owned(),
    })
}

/// Pretends to be COLMAP: the mapper writes two models, the second with more cameras.
fn fake_colmap(cmd: &ToolCommand) -> Result<ToolOutput> {
    if cmd.stage == "mapper" {
        let sparse = PathBuf::from(arg_value(cmd, "output_path").unwrap());
        std::fs::create_dir_all(sparse.join("0"))?;
        std::fs::create_dir_all(sparse.join("1"))?;
        std::fs::write(sparse.join("0").join("images.bin"), vec![0u8; 10])?;
        std::fs::write(sparse.join("1").join("images.bin"), vec![0u8; 100])?;
    }
    Ok(ok_output())
}

#[tokio::test]
async fn test_cloud_never_runs_a_process() -> Result<()> {
    let fx = Fixture::new(3)?;
    let runner = Arc::new(FakeRunner::succeeding());
    let reconstructor = fx.reconstructor(runner.clone(), true, true);

    let outcome = reconstructor
        .reconstruct(
            &fx.frames_dir,
            &fx.output_dir,
            &ReconstructOptions {
                mode: ReconstructionMode::Splat,
                dense: true,
                cloud: true,
                ..Default::default()
            },
        )
        .await?;

    match outcome {
        ReconstructionOutcome::CloudGuidance { guidance } => {
            assert!(guidance.contains("Colab"));
            assert!(guidance.contains("gsplat"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(runner.calls().is_empty());
    assert!(fx.output_dir.join("reconstruction").join(RESULT_FILE_NAME).exists());
    Ok(())
}

#[tokio::test]
async fn test_missing_tool_returns_guidance() -> Result<()> {
    let fx = Fixture::new(3)?;
    let runner = Arc::new(FakeRunner::succeeding());
    let reconstructor = fx.reconstructor(runner.clone(), false, false);

    let outcome = reconstructor
        .reconstruct(&fx.frames_dir, &fx.output_dir, &ReconstructOptions::default())
        .await?;

    match outcome {
        ReconstructionOutcome::NoLocalTool {
            install_guidance,
            cloud_guidance,
        } => {
            assert!(install_guidance.contains("COLMAP not found"));
            assert!(cloud_guidance.contains("KIRI"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(runner.calls().is_empty());

    let record = std::fs::read_to_string(fx.output_dir.join("reconstruction").join(RESULT_FILE_NAME))?;
    let json: serde_json::Value = serde_json::from_str(&record)?;
    assert_eq!(json["result"]["outcome"], "no_local_tool");
    assert_eq!(json["mode"], "meshroom");
    Ok(())
}

#[tokio::test]
async fn test_sparse_steps_run_in_order() -> Result<()> {
    let fx = Fixture::new(4)?;
    let runner = Arc::new(FakeRunner::new(|cmd| {
        if cmd.stage == "accelerator_probe" {
            return Ok(ToolOutput {
                exit_code: Some(0),
                stdout: "NVIDIA GeForce RTX 3060, 12288\n".to_owned(),
                ..Default::default()
            });
        }
        fake_colmap(cmd)
    }));
    let reconstructor = fx.reconstructor(runner.clone(), true, false);

    let outcome = reconstructor
        .reconstruct(&fx.frames_dir, &fx.output_dir, &ReconstructOptions::default())
        .await?;

    assert_eq!(
        runner.stages(),
        vec![
            "accelerator_probe",
            "feature_extractor",
            "exhaustive_matcher",
            "mapper",
            "model_converter"
        ]
    );

    let extract = runner.call_for("feature_extractor").unwrap();
    assert_eq!(extract.subcommand(), Some("feature_extractor"));
    assert_eq!(extract.program, fx.colmap_bin);
    assert_eq!(arg_value(&extract, "SiftExtraction.peak_threshold").as_deref(), Some("0.004"));
    assert_eq!(arg_value(&extract, "SiftExtraction.use_gpu").as_deref(), Some("1"));
    assert_eq!(arg_value(&extract, "ImageReader.single_camera").as_deref(), Some("1"));

    let convert = runner.call_for("model_converter").unwrap();
    let sparse_dir = fx.output_dir.join("reconstruction").join("sparse");
    assert_eq!(
        arg_value(&convert, "input_path"),
        Some(sparse_dir.join("1").to_string_lossy().to_string())
    );

    match outcome {
        ReconstructionOutcome::Local {
            accelerator,
            sparse,
            dense,
            dense_skipped,
            ..
        } => {
            assert_eq!(accelerator.vram_mb, 12288);
            assert_eq!(sparse.num_models, 2);
            assert_eq!(sparse.selected_model, Some(sparse_dir.join("1")));
            assert!(dense.is_none());
            assert!(dense_skipped.is_none());
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_dense_skipped_without_accelerator() -> Result<()> {
    let fx = Fixture::new(3)?;
    let runner = Arc::new(FakeRunner::new(|cmd| {
        if cmd.stage == "accelerator_probe" {
            return Ok(failed_output("NVIDIA-SMI has failed"));
        }
        fake_colmap(cmd)
    }));
    let reconstructor = fx.reconstructor(runner.clone(), true, false);

    let outcome = reconstructor
        .reconstruct(
            &fx.frames_dir,
            &fx.output_dir,
            &ReconstructOptions {
                dense: true,
                ..Default::default()
            },
        )
        .await?;

    assert!(runner.call_for("image_undistorter").is_none());
    let extract = runner.call_for("feature_extractor").unwrap();
    assert_eq!(arg_value(&extract, "SiftExtraction.use_gpu").as_deref(), Some("0"));
    match outcome {
        ReconstructionOutcome::Local {
            accelerator,
            dense_skipped,
            ..
        } => {
            assert!(!accelerator.has_accelerator);
            assert_eq!(dense_skipped, Some(DenseSkip::NoAccelerator));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_dense_not_applicable_for_splat() -> Result<()> {
    let fx = Fixture::new(3)?;
    let runner = Arc::new(FakeRunner::new(fake_colmap));
    let reconstructor = fx.reconstructor(runner.clone(), true, true);

    let outcome = reconstructor
        .reconstruct(
            &fx.frames_dir,
            &fx.output_dir,
            &ReconstructOptions {
                mode: ReconstructionMode::Splat,
                dense: true,
                accelerator: gpu(12288),
                ..Default::default()
            },
        )
        .await?;

    assert!(runner.call_for("meshroom_batch").is_none());
    assert!(runner.call_for("patch_match_stereo").is_none());
    match outcome {
        ReconstructionOutcome::Local { dense_skipped, .. } => {
            assert_eq!(
                dense_skipped,
                Some(DenseSkip::ModeNotApplicable(ReconstructionMode::Splat))
            );
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_mesher_failure_keeps_dense_cloud() -> Result<()> {
    let fx = Fixture::new(3)?;
    let runner = Arc::new(FakeRunner::new(|cmd| {
        if cmd.stage == "poisson_mesher" {
            return Ok(failed_output("poisson: out of memory"));
        }
        fake_colmap(cmd)
    }));
    let reconstructor = fx.reconstructor(runner.clone(), true, false);

    let outcome = reconstructor
        .reconstruct(
            &fx.frames_dir,
            &fx.output_dir,
            &ReconstructOptions {
                dense: true,
                accelerator: gpu(2048),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(
        runner.stages(),
        vec![
            "feature_extractor",
            "exhaustive_matcher",
            "mapper",
            "model_converter",
            "image_undistorter",
            "patch_match_stereo",
            "stereo_fusion",
            "poisson_mesher"
        ]
    );
    let fusion = runner.call_for("stereo_fusion").unwrap();
    assert_eq!(arg_value(&fusion, "StereoFusion.check_num_images").as_deref(), Some("15"));
    let undistort = runner.call_for("image_undistorter").unwrap();
    assert_eq!(arg_value(&undistort, "max_image_size").as_deref(), Some("1000"));

    match outcome {
        ReconstructionOutcome::Local { dense, warnings, .. } => {
            let dense = dense.unwrap();
            assert!(dense.ply_path.ends_with("fused.ply"));
            assert!(dense.mesh_path.is_none());
            assert!(dense.mesh_error.unwrap().contains("out of memory"));
            // 2048MB is under the VRAM floor
            assert_eq!(warnings.len(), 1);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_failed_stage_is_named() -> Result<()> {
    let fx = Fixture::new(3)?;
    let runner = Arc::new(FakeRunner::new(|cmd| {
        if cmd.stage == "feature_extractor" {
            return Ok(failed_output("Failed to read image file format"));
        }
        Ok(ok_output())
    }));
    let reconstructor = fx.reconstructor(runner.clone(), true, false);

    let err = reconstructor
        .reconstruct(
            &fx.frames_dir,
            &fx.output_dir,
            &ReconstructOptions {
                accelerator: gpu(8192),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::ExternalTool {
            stage,
            exit_code,
            stderr,
            ..
        }) => {
            assert_eq!(stage, "feature_extractor");
            assert_eq!(*exit_code, Some(1));
            assert!(stderr.contains("Failed to read image"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(runner.stages(), vec!["feature_extractor"]);
    Ok(())
}

#[tokio::test]
async fn test_meshroom_preferred_for_dense_mesh() -> Result<()> {
    let fx = Fixture::new(3)?;
    let runner = Arc::new(FakeRunner::succeeding());
    let reconstructor = fx.reconstructor(runner.clone(), true, true);

    let outcome = reconstructor
        .reconstruct(
            &fx.frames_dir,
            &fx.output_dir,
            &ReconstructOptions {
                dense: true,
                accelerator: gpu(8192),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(runner.stages(), vec!["meshroom_batch"]);
    let call = runner.call_for("meshroom_batch").unwrap();
    assert_eq!(call.program, fx.meshroom_bin);
    assert!(call
        .args
        .iter()
        .any(|a| a == "FeatureExtraction:describerPreset=high"));
    assert!(matches!(outcome, ReconstructionOutcome::Meshroom { .. }));
    Ok(())
}

#[tokio::test]
async fn test_empty_frames_directory_is_an_error() -> Result<()> {
    let fx = Fixture::new(0)?;
    let runner = Arc::new(FakeRunner::succeeding());
    let reconstructor = fx.reconstructor(runner.clone(), true, false);

    let err = reconstructor
        .reconstruct(&fx.frames_dir, &fx.output_dir, &ReconstructOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::NoFrames(_))
    ));
    Ok(())
}

#[test]
fn test_largest_model_ties_go_to_lowest() -> Result<()> {
    let dir = tempfile::tempdir()?;
    for (name, size) in [("0", 50), ("1", 80), ("2", 80)] {
        let model = dir.path().join(name);
        std::fs::create_dir_all(&model)?;
        std::fs::write(model.join("images.bin"), vec![0u8; size])?;
    }
    std::fs::create_dir_all(dir.path().join("notes"))?;

    let (count, best) = select_largest_model(dir.path())?;
    assert_eq!(count, 3);
    assert_eq!(best, Some(dir.path().join("1")));

    assert_eq!(select_largest_model(&dir.path().join("missing"))?, (0, None));
    Ok(())
}

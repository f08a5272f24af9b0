use crate::accel::{self, AcceleratorInfo};
use crate::command::{run_checked, ToolCommand, ToolRunner};
use crate::config::{DetailConfig, DreamscanConfig, ReconstructionConfig};
use crate::detail::{self, DetailAssessment};
use crate::error::PipelineError;
use crate::frame::count_frames;
use crate::guidance;
use crate::mode::ReconstructionMode;
use crate::params::{self, ParameterSet};
use crate::probe::{Availability, ToolProbe};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

pub const RESULT_FILE_NAME: &str = "result.json";

#[derive(Debug, Clone, Default)]
pub struct ReconstructOptions {
    pub mode: ReconstructionMode,
    pub dense: bool,
    pub cloud: bool,

    /// Skips the accelerator probe when already known
    pub accelerator: Option<AcceleratorInfo>,

    /// Archive of the frames, mentioned in cloud guidance
    pub frames_archive: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SparseResult {
    pub sparse_dir: PathBuf,
    pub database_path: PathBuf,
    pub num_models: usize,
    pub selected_model: Option<PathBuf>,
    pub ply_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenseResult {
    pub ply_path: PathBuf,
    pub mesh_path: Option<PathBuf>,

    /// Why meshing produced nothing, when it failed
    pub mesh_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenseSkip {
    NoAccelerator,
    NoSparseModel,
    ModeNotApplicable(ReconstructionMode),
}

#[derive(Debug, Clone, Serialize)]
pub struct MeshroomResult {
    pub output_dir: PathBuf,
    pub mesh_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconstructionOutcome {
    /// Local execution was not attempted
    CloudGuidance { guidance: String },

    /// No local reconstruction tool; the caller gets an actionable way forward instead
    NoLocalTool {
        install_guidance: String,
        cloud_guidance: String,
    },

    Meshroom {
        tool: PathBuf,
        detail: DetailAssessment,
        parameters: ParameterSet,
        meshroom: MeshroomResult,
    },

    Local {
        tool: PathBuf,
        accelerator: AcceleratorInfo,
        detail: DetailAssessment,
        parameters: ParameterSet,
        sparse: SparseResult,
        dense: Option<DenseResult>,
        dense_skipped: Option<DenseSkip>,
        warnings: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultRecord<'a> {
    pub timestamp: DateTime<Utc>,
    pub mode: ReconstructionMode,
    pub frames_dir: &'a Path,
    pub result: &'a ReconstructionOutcome,
}

/// Numbered model directories under `sparse_dir` and the one with the largest `images.bin`,
/// which stands in for the registered camera count.
pub fn select_largest_model(sparse_dir: &Path) -> Result<(usize, Option<PathBuf>)> {
    if !sparse_dir.is_dir() {
        return Ok((0, None));
    }
    let mut models = std::fs::read_dir(sparse_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_dir()
                && p.file_name()
                    .map(|n| !n.is_empty() && n.to_string_lossy().chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
        })
        .collect::<Vec<PathBuf>>();
    models.sort();

    let images_size = |p: &PathBuf| {
        std::fs::metadata(p.join("images.bin"))
            .map(|m| m.len())
            .unwrap_or(0)
    };
    // max_by_key keeps the last maximum; iterate reversed so ties go to the lowest index
    let best = models.iter().rev().max_by_key(|p| images_size(p)).cloned();
    Ok((models.len(), best))
}

fn use_gpu_flag(accelerator: &AcceleratorInfo) -> &'static str {
    if accelerator.has_accelerator {
        "1"
    } else {
        "0"
    }
}

/// Decides where and how to reconstruct, then drives the external tools.
pub struct Reconstructor {
    runner: Arc<dyn ToolRunner>,
    config: ReconstructionConfig,
    detail_config: DetailConfig,
    colmap: ToolProbe,
    meshroom: ToolProbe,
}

impl Reconstructor {
    pub fn new(runner: Arc<dyn ToolRunner>, config: &DreamscanConfig) -> Self {
        let project_root = config
            .reconstruction
            .project_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        Reconstructor {
            runner,
            config: config.reconstruction.clone(),
            detail_config: config.detail.clone(),
            colmap: ToolProbe::colmap(&project_root),
            meshroom: ToolProbe::meshroom(),
        }
    }

    pub fn with_probes(mut self, colmap: ToolProbe, meshroom: ToolProbe) -> Self {
        self.colmap = colmap;
        self.meshroom = meshroom;
        self
    }

    pub async fn reconstruct(
        &self,
        frames_dir: &Path,
        output_dir: &Path,
        options: &ReconstructOptions,
    ) -> Result<ReconstructionOutcome> {
        let recon_dir = output_dir.join("reconstruction");
        std::fs::create_dir_all(&recon_dir)?;

        let outcome = self.dispatch(frames_dir, &recon_dir, options).await?;

        let record = ResultRecord {
            timestamp: Utc::now(),
            mode: options.mode,
            frames_dir,
            result: &outcome,
        };
        std::fs::write(
            recon_dir.join(RESULT_FILE_NAME),
            serde_json::to_string_pretty(&record)?,
        )?;
        Ok(outcome)
    }

    async fn dispatch(
        &self,
        frames_dir: &Path,
        recon_dir: &Path,
        options: &ReconstructOptions,
    ) -> Result<ReconstructionOutcome> {
        let archive = options.frames_archive.as_deref();

        if options.cloud {
            let guidance = guidance::cloud_guidance(options.mode, archive);
            println!("{}", guidance);
            return Ok(ReconstructionOutcome::CloudGuidance { guidance });
        }

        let colmap_bin = match self.colmap.probe() {
            Availability::Found(p) => p,
            Availability::Missing => {
                warn!("COLMAP not found locally");
                let install_guidance = guidance::install_guidance();
                let cloud_guidance = guidance::cloud_guidance(options.mode, archive);
                println!("{}", install_guidance);
                println!("{}", cloud_guidance);
                return Ok(ReconstructionOutcome::NoLocalTool {
                    install_guidance,
                    cloud_guidance,
                });
            }
        };

        let num_frames = count_frames(frames_dir);
        if num_frames == 0 {
            return Err(PipelineError::NoFrames(frames_dir.to_path_buf()).into());
        }

        let accelerator = match &options.accelerator {
            Some(a) => a.clone(),
            None => accel::probe(self.runner.as_ref(), self.config.accelerator_probe_timeout_secs).await,
        };
        if accelerator.has_accelerator {
            info!("Accelerator: {} ({}MB)", accelerator.name, accelerator.vram_mb);
        } else {
            info!("Accelerator: none (CPU mode)");
        }

        let detail = detail::assess(frames_dir, &self.detail_config)?;
        let parameters = params::select(detail.detail_level, detail.coverage_pct);

        if options.dense && options.mode == ReconstructionMode::Meshroom {
            if let Availability::Found(meshroom_bin) = self.meshroom.probe() {
                info!("Using the full mesh pipeline: {:?}", meshroom_bin);
                let meshroom = self
                    .run_meshroom(&meshroom_bin, frames_dir, recon_dir, &parameters)
                    .await?;
                return Ok(ReconstructionOutcome::Meshroom {
                    tool: meshroom_bin,
                    detail,
                    parameters,
                    meshroom,
                });
            }
            info!("Meshroom not found, using COLMAP for dense reconstruction");
        }

        let sparse = self
            .run_sparse(&colmap_bin, frames_dir, recon_dir, &parameters, &accelerator, num_frames)
            .await?;

        let mut warnings = vec![];
        let (dense, dense_skipped) = if !options.dense {
            (None, None)
        } else if !options.mode.supports_dense() {
            info!(
                "Dense reconstruction skipped, not applicable for '{}' mode (its trainer densifies)",
                options.mode
            );
            (None, Some(DenseSkip::ModeNotApplicable(options.mode)))
        } else if !accelerator.has_accelerator {
            warn!("Skipping dense reconstruction, it requires a GPU");
            (None, Some(DenseSkip::NoAccelerator))
        } else {
            match &sparse.selected_model {
                None => {
                    warn!("Skipping dense reconstruction, no sparse model was produced");
                    (None, Some(DenseSkip::NoSparseModel))
                }
                Some(model_dir) => {
                    if accelerator.vram_mb < self.config.vram_floor_mb {
                        let msg = format!(
                            "Dense MVS wants about {}MB of VRAM, {} has {}MB. Proceeding anyway, it may fail or be very slow",
                            self.config.vram_floor_mb, accelerator.name, accelerator.vram_mb
                        );
                        warn!("{}", msg);
                        warnings.push(msg);
                    }
                    let dense = self
                        .run_dense(&colmap_bin, frames_dir, model_dir, recon_dir, num_frames)
                        .await?;
                    (Some(dense), None)
                }
            }
        };

        Ok(ReconstructionOutcome::Local {
            tool: colmap_bin,
            accelerator,
            detail,
            parameters,
            sparse,
            dense,
            dense_skipped,
            warnings,
        })
    }

    async fn run_sparse(
        &self,
        colmap_bin: &Path,
        frames_dir: &Path,
        recon_dir: &Path,
        parameters: &ParameterSet,
        accelerator: &AcceleratorInfo,
        num_frames: usize,
    ) -> Result<SparseResult> {
        let database_path = recon_dir.join("database.db");
        let sparse_dir = recon_dir.join("sparse");
        std::fs::create_dir_all(&sparse_dir)?;
        let use_gpu = use_gpu_flag(accelerator);
        let sift = &parameters.sift;

        info!("[1/4] Extracting features");
        run_checked(
            self.runner.as_ref(),
            &ToolCommand::new("feature_extractor", colmap_bin)
                .arg("feature_extractor")
                .path_opt("database_path", &database_path)
                .path_opt("image_path", frames_dir)
                .opt("ImageReader.single_camera", 1)
                .opt("SiftExtraction.peak_threshold", sift.peak_threshold)
                .opt("SiftExtraction.edge_threshold", sift.edge_threshold)
                .opt("SiftExtraction.first_octave", sift.first_octave)
                .opt("SiftExtraction.max_num_features", sift.max_num_features)
                .opt("SiftExtraction.use_gpu", use_gpu),
        )
        .await?;

        // Sequential matching breaks apart when feature-poor frames cannot bridge a gap
        info!("[2/4] Matching features (exhaustive, {} frames)", num_frames);
        run_checked(
            self.runner.as_ref(),
            &ToolCommand::new("exhaustive_matcher", colmap_bin)
                .arg("exhaustive_matcher")
                .path_opt("database_path", &database_path)
                .opt("SiftMatching.use_gpu", use_gpu),
        )
        .await?;

        info!("[3/4] Running mapper");
        run_checked(
            self.runner.as_ref(),
            &ToolCommand::new("mapper", colmap_bin)
                .arg("mapper")
                .path_opt("database_path", &database_path)
                .path_opt("image_path", frames_dir)
                .path_opt("output_path", &sparse_dir),
        )
        .await?;

        let (num_models, selected_model) = select_largest_model(&sparse_dir)?;
        let ply_path = match &selected_model {
            Some(model) => {
                info!("[4/4] Exporting model {:?} ({} total) to PLY", model, num_models);
                let ply_path = recon_dir.join("sparse.ply");
                run_checked(
                    self.runner.as_ref(),
                    &ToolCommand::new("model_converter", colmap_bin)
                        .arg("model_converter")
                        .path_opt("input_path", model)
                        .path_opt("output_path", &ply_path)
                        .opt("output_type", "PLY"),
                )
                .await?;
                Some(ply_path)
            }
            None => {
                warn!("[4/4] No models found, the mapper registered no images");
                None
            }
        };

        Ok(SparseResult {
            sparse_dir,
            database_path,
            num_models,
            selected_model,
            ply_path,
        })
    }

    async fn run_dense(
        &self,
        colmap_bin: &Path,
        frames_dir: &Path,
        model_dir: &Path,
        recon_dir: &Path,
        num_frames: usize,
    ) -> Result<DenseResult> {
        let dense_dir = recon_dir.join("dense");
        std::fs::create_dir_all(&dense_dir)?;

        info!("[dense 1/3] Undistorting images");
        run_checked(
            self.runner.as_ref(),
            &ToolCommand::new("image_undistorter", colmap_bin)
                .arg("image_undistorter")
                .path_opt("image_path", frames_dir)
                .path_opt("input_path", model_dir)
                .path_opt("output_path", &dense_dir)
                .opt("output_type", "COLMAP")
                .opt("max_image_size", self.config.undistort_max_image_size),
        )
        .await?;

        info!("[dense 2/3] Running patch match stereo");
        run_checked(
            self.runner.as_ref(),
            &ToolCommand::new("patch_match_stereo", colmap_bin)
                .arg("patch_match_stereo")
                .path_opt("workspace_path", &dense_dir)
                .opt("workspace_format", "COLMAP")
                .opt("PatchMatchStereo.geom_consistency", "true")
                .opt("PatchMatchStereo.gpu_index", 0),
        )
        .await?;

        info!("[dense 3/3] Fusing to dense point cloud");
        let fused_ply = dense_dir.join("fused.ply");
        let mut fusion = ToolCommand::new("stereo_fusion", colmap_bin)
            .arg("stereo_fusion")
            .path_opt("workspace_path", &dense_dir)
            .opt("workspace_format", "COLMAP")
            .path_opt("output_path", &fused_ply)
            .opt("output_type", "PLY");
        if num_frames < self.config.small_batch_frames {
            fusion = fusion.opt(
                "StereoFusion.check_num_images",
                self.config.fusion_check_num_images,
            );
        }
        run_checked(self.runner.as_ref(), &fusion).await?;

        info!("[dense +] Running Poisson surface reconstruction");
        let mesh_ply = dense_dir.join("meshed.ply");
        let meshing = run_checked(
            self.runner.as_ref(),
            &ToolCommand::new("poisson_mesher", colmap_bin)
                .arg("poisson_mesher")
                .path_opt("input_path", &fused_ply)
                .path_opt("output_path", &mesh_ply),
        )
        .await;

        let (mesh_path, mesh_error) = match meshing {
            Ok(_) if mesh_ply.exists() => (Some(mesh_ply), None),
            Ok(_) => (None, Some("mesher produced no output".to_owned())),
            Err(why) => {
                warn!("Poisson mesher skipped ({}). Dense cloud still available", why);
                (None, Some(why.to_string()))
            }
        };

        Ok(DenseResult {
            ply_path: fused_ply,
            mesh_path,
            mesh_error,
        })
    }

    async fn run_meshroom(
        &self,
        meshroom_bin: &Path,
        frames_dir: &Path,
        recon_dir: &Path,
        parameters: &ParameterSet,
    ) -> Result<MeshroomResult> {
        let output_dir = recon_dir.join("meshroom");
        std::fs::create_dir_all(&output_dir)?;

        let cmd = parameters.meshroom_overrides.iter().fold(
            ToolCommand::new("meshroom_batch", meshroom_bin)
                .path_opt("input", frames_dir)
                .path_opt("output", &output_dir),
            |cmd, o| cmd.opt("paramOverrides", o),
        );

        info!("Running Meshroom pipeline ({:?} parameters)", parameters.tier);
        run_checked(self.runner.as_ref(), &cmd).await?;

        let mut meshes = WalkDir::new(&output_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.extension().map(|e| e == "obj").unwrap_or(false))
            .collect::<Vec<PathBuf>>();
        meshes.sort();

        Ok(MeshroomResult {
            output_dir,
            mesh_path: meshes.into_iter().next(),
        })
    }
}

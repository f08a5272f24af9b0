use crate::mode::ReconstructionMode;
use std::path::Path;

const RULE: &str = "============================================================";

fn block(lines: &[&str]) -> String {
    lines.iter().map(|l| format!("{}\n", l)).collect()
}

/// Step-by-step instructions for reconstructing in a hosted venue instead of locally.
pub fn cloud_guidance(mode: ReconstructionMode, frames_archive: Option<&Path>) -> String {
    let mut s = block(&[RULE, "Cloud Reconstruction Options", RULE]);

    if let Some(archive) = frames_archive {
        s.push_str(&format!("\nYour frames archive: {}\n", archive.display()));
        s.push_str("Upload this to one of the services below.\n");
    }

    s.push_str(&block(&[
        "",
        "1. Google Colab + COLMAP (FREE, hosted notebook with a T4 GPU)",
        "   - Open: https://colab.research.google.com",
        "   - Install: !apt-get install colmap",
        "   - Upload your frames archive and extract it",
        "   - Run COLMAP feature_extractor -> exhaustive_matcher -> mapper",
    ]));
    s.push_str(&match mode {
        ReconstructionMode::Splat => block(&[
            "   - Then train with gsplat: pip install gsplat",
            "   - Or use: github.com/camenduru/gaussian-splatting-colab",
        ]),
        ReconstructionMode::Nerf => block(&[
            "   - Then train with nerfstudio: pip install nerfstudio",
            "   - Run: ns-process-data images --data ./frames --output-dir ./processed",
            "   - Run: ns-train nerfacto --data ./processed",
        ]),
        ReconstructionMode::Meshroom => block(&["   - Download the sparse/dense PLY result"]),
    });
    s.push_str(&block(&[
        "   *** RECOMMENDED: free, full control ***",
        "",
        "2. KIRI Engine (FREE web upload)",
        "   - Go to: https://www.kiriengine.com",
        "   - Upload frames (drag and drop)",
        "   - Processes automatically, download the 3D model",
        "   - Easiest option, less control over parameters",
        "",
        "3. RunPod (PAID on-demand GPU)",
        "   - Go to: https://www.runpod.io",
        "   - Launch a GPU pod (COLMAP + gsplat/nerfstudio installable)",
    ]));
    s.push_str(&format!(
        "   - Upload frames, run: dreamscan reconstruct -f <frames> -o <output> -m {}\n",
        mode
    ));
    s.push_str(&block(&["   - Best for large datasets or repeated processing", RULE]));
    s
}

pub fn install_guidance() -> String {
    block(&[
        "COLMAP not found. Installation options:",
        "  Windows: Download from https://github.com/colmap/colmap/releases",
        "           Extract and add to PATH, or place in the project as:",
        "           COLMAP/COLMAP-3.9.1-windows-cuda/COLMAP.bat",
        "  Linux:   sudo apt-get install colmap",
        "  macOS:   brew install colmap",
        "  Conda:   conda install -c conda-forge colmap",
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guidance_names_all_venues() {
        let text = cloud_guidance(ReconstructionMode::Meshroom, None);
        assert!(text.contains("Colab"));
        assert!(text.contains("KIRI"));
        assert!(text.contains("RunPod"));
    }

    #[test]
    fn test_guidance_is_mode_specific() {
        assert!(cloud_guidance(ReconstructionMode::Splat, None).contains("gsplat"));
        assert!(cloud_guidance(ReconstructionMode::Nerf, None).contains("ns-train"));
    }

    #[test]
    fn test_guidance_names_the_archive() {
        let text = cloud_guidance(ReconstructionMode::Splat, Some(Path::new("/tmp/frames.zip")));
        assert!(text.contains("Your frames archive: /tmp/frames.zip"));
        assert!(text.contains("-m splat"));
        assert!(text.ends_with(&format!("{}\n", RULE)));
    }
}

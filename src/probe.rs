use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const COLMAP_PROGRAM: &str = "colmap";
pub const MESHROOM_PROGRAM: &str = "meshroom_batch";

/// One place a tool might live.
#[derive(Debug, Clone)]
pub enum ProbeSource {
    /// Executable name looked up on `PATH`
    SearchPath(String),
    /// Directory searched recursively for a file name. The lexically last match wins so newer
    /// versioned folders are preferred.
    InstallTree { root: PathBuf, file_name: String },
    Fixed(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Found(PathBuf),
    Missing,
}

impl Availability {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Availability::Found(p) => Some(p),
            Availability::Missing => None,
        }
    }
}

impl ProbeSource {
    pub fn locate(&self) -> Option<PathBuf> {
        match self {
            ProbeSource::SearchPath(name) => which::which(name).ok(),
            ProbeSource::InstallTree { root, file_name } => {
                if !root.is_dir() {
                    return None;
                }
                let mut matches = WalkDir::new(root)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file() && e.file_name().to_string_lossy() == *file_name)
                    .map(|e| e.into_path())
                    .collect::<Vec<PathBuf>>();
                matches.sort();
                matches.pop()
            }
            ProbeSource::Fixed(path) => {
                if path.is_file() {
                    Some(path.to_owned())
                } else {
                    None
                }
            }
        }
    }
}

/// An ordered list of places to look for one tool. The first source that resolves wins.
#[derive(Debug, Clone)]
pub struct ToolProbe {
    pub tool: String,
    pub sources: Vec<ProbeSource>,
}

impl ToolProbe {
    pub fn new(tool: &str, sources: Vec<ProbeSource>) -> Self {
        ToolProbe {
            tool: tool.to_owned(),
            sources,
        }
    }

    /// `PATH` first, then a `COLMAP/` folder unpacked under the project root.
    pub fn colmap(project_root: &Path) -> Self {
        let install_root = project_root.join("COLMAP");
        ToolProbe::new(
            COLMAP_PROGRAM,
            vec![
                ProbeSource::SearchPath(COLMAP_PROGRAM.to_owned()),
                ProbeSource::InstallTree {
                    root: install_root.clone(),
                    file_name: "COLMAP.bat".to_owned(),
                },
                ProbeSource::InstallTree {
                    root: install_root.clone(),
                    file_name: "colmap.exe".to_owned(),
                },
                ProbeSource::InstallTree {
                    root: install_root,
                    file_name: COLMAP_PROGRAM.to_owned(),
                },
            ],
        )
    }

    pub fn meshroom() -> Self {
        ToolProbe::new(
            MESHROOM_PROGRAM,
            vec![
                ProbeSource::SearchPath(MESHROOM_PROGRAM.to_owned()),
                ProbeSource::Fixed(PathBuf::from("C:/Program Files/Meshroom/meshroom_batch.exe")),
                ProbeSource::Fixed(PathBuf::from(
                    "C:/Program Files/AliceVision/bin/meshroom_batch.exe",
                )),
            ],
        )
    }

    pub fn probe(&self) -> Availability {
        match self.sources.iter().find_map(|s| s.locate()) {
            Some(path) => {
                info!("Found {}: {:?}", self.tool, path);
                Availability::Found(path)
            }
            None => Availability::Missing,
        }
    }
}

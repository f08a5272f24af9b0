use anyhow::Result;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

pub const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// One image file of a captured sequence. Frames are ordered by the zero-padded index embedded
/// in the file stem (`frame_000042.png`), falling back to the file name.
#[derive(Debug, Clone)]
pub struct Frame {
    pub path: PathBuf,
    pub index: Option<u64>,
}

pub fn is_frame_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| FRAME_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
}

fn index_from_stem(stem: &str) -> Option<u64> {
    let digits: String = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<char>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse::<u64>().ok()
}

impl Frame {
    pub fn new(path: &Path) -> Self {
        let index = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(index_from_stem);
        Frame {
            path: path.to_path_buf(),
            index,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

impl Ord for Frame {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.index, other.index) {
            (Some(a), Some(b)) if a != b => a.cmp(&b),
            _ => self.file_name().cmp(&other.file_name()),
        }
    }
}

impl PartialOrd for Frame {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frame {}

/// Lists the frames of a directory in sequence order. A missing directory yields an empty list.
pub fn list_frames(dir: &Path) -> Result<Vec<Frame>> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut frames = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| is_frame_file(p))
        .map(|p| Frame::new(&p))
        .collect::<Vec<Frame>>();
    frames.sort();
    Ok(frames)
}

pub fn count_frames(dir: &Path) -> usize {
    list_frames(dir).map(|f| f.len()).unwrap_or(0)
}

#![allow(dead_code)]

use anyhow::Result;
use dreamscan::command::{ToolCommand, ToolOutput, ToolRunner};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const WIDTH: u32 = 128;
pub const HEIGHT: u32 = 96;

/// Black frame with a checkerboard of `color` over rows 30..86. The top of the frame stays empty
/// so it never reads as an editor overlay.
pub fn checker_frame(color: [u8; 3]) -> RgbImage {
    RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        if (30..86).contains(&y) && ((x / 2) + (y / 2)) % 2 == 0 {
            Rgb(color)
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// A frame with no second-derivative response at all.
pub fn flat_frame(level: u8) -> RgbImage {
    RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([level, level, level]))
}

/// A sharp frame whose top band is painted in the editor's blue accent.
pub fn overlay_frame() -> RgbImage {
    let mut img = checker_frame([255, 0, 0]);
    for y in 0..12 {
        for x in 0..WIDTH {
            img.put_pixel(x, y, Rgb([0, 0, 255]));
        }
    }
    img
}

/// Frame painted in horizontal bands of `(rows, color)`, top to bottom; rows past the last band
/// stay black.
pub fn banded_frame(bands: &[(u32, [u8; 3])]) -> RgbImage {
    let mut img = RgbImage::new(WIDTH, HEIGHT);
    let mut top = 0;
    for (rows, color) in bands {
        for y in top..(top + rows).min(HEIGHT) {
            for x in 0..WIDTH {
                img.put_pixel(x, y, Rgb(*color));
            }
        }
        top += rows;
    }
    img
}

/// Black frame with a solid grey rectangle covering `x0..=x1`, `y0..=y1`.
pub fn boxed_frame(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if (x0..=x1).contains(&x) && (y0..=y1).contains(&y) {
            Rgb([200, 200, 200])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

pub fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("frame_{:06}.png", index))
}

pub fn write_frames(dir: &Path, frames: &[RgbImage]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    for (i, f) in frames.iter().enumerate() {
        f.save(frame_path(dir, i))?;
    }
    Ok(())
}

/// Fills `dir` with `count` tiny placeholder files that only need to look like frames.
pub fn touch_frames(dir: &Path, count: usize) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    for i in 0..count {
        std::fs::write(frame_path(dir, i), b"")?;
    }
    Ok(())
}

pub fn ok_output() -> ToolOutput {
    ToolOutput {
        exit_code: Some(0),
        ..Default::default()
    }
}

pub fn failed_output(stderr: &str) -> ToolOutput {
    ToolOutput {
        exit_code: Some(1),
        stderr: stderr.to_owned(),
        ..Default::default()
    }
}

type Behaviour = Box<dyn Fn(&ToolCommand) -> Result<ToolOutput> + Send + Sync>;

/// Records every command and answers with a scripted behaviour instead of spawning anything.
pub struct FakeRunner {
    calls: Mutex<Vec<ToolCommand>>,
    behaviour: Behaviour,
}

impl FakeRunner {
    pub fn new<F>(behaviour: F) -> Self
    where
        F: Fn(&ToolCommand) -> Result<ToolOutput> + Send + Sync + 'static,
    {
        FakeRunner {
            calls: Mutex::new(vec![]),
            behaviour: Box::new(behaviour),
        }
    }

    pub fn succeeding() -> Self {
        FakeRunner::new(|_| Ok(ok_output()))
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stages(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.stage.clone()).collect()
    }

    pub fn call_for(&self, stage: &str) -> Option<ToolCommand> {
        self.calls().into_iter().find(|c| c.stage == stage)
    }
}

#[async_trait::async_trait]
impl ToolRunner for FakeRunner {
    async fn run(&self, cmd: &ToolCommand) -> Result<ToolOutput> {
        self.calls.lock().unwrap().push(cmd.clone());
        (self.behaviour)(cmd)
    }
}

/// Value following `--name` in a command's argument list.
pub fn arg_value(cmd: &ToolCommand, name: &str) -> Option<String> {
    let flag = format!("--{}", name);
    cmd.args
        .iter()
        .position(|a| *a == flag)
        .and_then(|i| cmd.args.get(i + 1).cloned())
}

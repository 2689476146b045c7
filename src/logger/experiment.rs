use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::visualize::visualizer::Figure;

pub const SCALARS_FILE: &str = "scalars.jsonl";
pub const FIGURES_DIR: &str = "figures";

/// One line of `scalars.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarEntry {
    pub tag: String,
    pub value: f64,
    pub step: usize,
}

/// Destination for scalars and figures, keyed by tag and global step.
pub trait Experiment {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()>;

    fn add_figure(&mut self, tag: &str, figure: &Figure, step: usize) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes scalars as JSON lines and figures as PNG files under one directory.
///
/// ```text
/// <root>/scalars.jsonl
/// <root>/figures/<tag>_<step>.png
/// ```
pub struct RunDirectory {
    root: PathBuf,
    scalars: BufWriter<File>,
}

impl RunDirectory {
    /// Creates the directory if needed; existing scalars are appended to.
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join(FIGURES_DIR))?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(root.join(SCALARS_FILE))?;
        Ok(RunDirectory { root, scalars: BufWriter::new(file) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Experiment for RunDirectory {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()> {
        let entry = ScalarEntry { tag: tag.to_owned(), value, step };
        serde_json::to_writer(&mut self.scalars, &entry)?;
        self.scalars.write_all(b"\n")?;
        Ok(())
    }

    fn add_figure(&mut self, tag: &str, figure: &Figure, step: usize) -> Result<()> {
        let name = tag.replace('/', "_");
        let path = self.root.join(FIGURES_DIR).join(format!("{name}_{step:06}.png"));
        figure.save(&path)?;
        log::debug!("Saved figure {}", path.display());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.scalars.flush()?;
        Ok(())
    }
}

impl Drop for RunDirectory {
    fn drop(&mut self) {
        if let Err(e) = self.scalars.flush() {
            log::warn!("Failed to flush {}: {e}", SCALARS_FILE);
        }
    }
}

/// Reads back every entry of a run directory's `scalars.jsonl`.
pub fn read_scalars(root: impl AsRef<Path>) -> Result<Vec<ScalarEntry>> {
    let file = File::open(root.as_ref().join(SCALARS_FILE))?;
    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }
    Ok(entries)
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryExperiment {
    pub scalars: Vec<ScalarEntry>,
    /// `(tag, step, dimensions)` of every figure.
    pub figures: Vec<(String, usize, (u32, u32))>,
}

impl MemoryExperiment {
    pub fn values(&self, tag: &str) -> Vec<f64> {
        self.scalars.iter().filter(|s| s.tag == tag).map(|s| s.value).collect()
    }
}

impl Experiment for MemoryExperiment {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()> {
        self.scalars.push(ScalarEntry { tag: tag.to_owned(), value, step });
        Ok(())
    }

    fn add_figure(&mut self, tag: &str, figure: &Figure, step: usize) -> Result<()> {
        self.figures.push((tag.to_owned(), step, figure.dimensions()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_run_directory_writes_scalars_and_figures() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut run = RunDirectory::create(dir.path()).unwrap();
            run.add_scalar("val/total_loss", 0.5, 3).unwrap();
            run.add_scalar("Accuracy", 25.0, 3).unwrap();
            run.add_figure("Predicted_Images", &RgbImage::new(3, 2), 3).unwrap();
        }
        let scalars = read_scalars(dir.path()).unwrap();
        assert_eq!(scalars.len(), 2);
        assert_eq!(scalars[0], ScalarEntry { tag: "val/total_loss".into(), value: 0.5, step: 3 });
        assert!(dir.path().join(FIGURES_DIR).join("Predicted_Images_000003.png").exists());
    }
}

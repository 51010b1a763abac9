use std::io::Write;
use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};
use crate::types::{CameraPose, Trajectory};

/// Serializes an object to a JSON file.
pub fn object_to_json<T: Serialize>(output_path: &Path, object: &T) -> Result<()> {
    let j = serde_json::to_string_pretty(object)?;
    let mut file = std::fs::File::create(output_path)?;
    file.write_all(j.as_bytes())?;
    Ok(())
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Reads an image list file: one name per line, blank lines and `#` comments
/// skipped.
pub fn read_image_list(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Lists image file names (not paths) in a directory, sorted.
pub fn list_image_names(dir: &Path) -> Result<Vec<String>> {
    let pattern = format!("{}/*", dir.display());
    let mut names: Vec<String> = glob::glob(&pattern)
        .map_err(|e| Error::Config(format!("bad glob pattern {}: {}", pattern, e)))?
        .filter_map(img_filter)
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect();
    names.sort();
    Ok(names)
}

fn img_filter(rp: glob::GlobResult) -> Option<std::path::PathBuf> {
    if let Ok(p) = rp {
        for ext in &[".png", ".jpg"] {
            if p.as_os_str().to_string_lossy().ends_with(ext) {
                return Some(p);
            }
        }
    }
    None
}

/// Loads the camera trajectory a reconstruction run left behind.
///
/// The mapper writes `poses.json` into its output directory: an array of
/// cam-from-world pose records, one per registered image.
pub fn load_trajectory(sfm_dir: &Path) -> Result<Trajectory> {
    let poses_path = sfm_dir.join("poses.json");
    if !poses_path.is_file() {
        return Err(Error::MissingInput(poses_path));
    }
    let poses: Vec<CameraPose> = object_from_json(&poses_path)?;
    Trajectory::new(poses)
}

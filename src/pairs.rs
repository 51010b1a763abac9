use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::io::read_image_list;

/// Shift-set policy for sequential pair scheduling.
///
/// With `quadratic` off the shifts are `0..overlap`; with it on they grow as
/// `floor(2^(d * quadratic_t))` for `d` in `0..overlap`, deduplicated. The
/// quadratic policy reaches far-apart frames with few pairs, which is what
/// keeps loop closure possible on long forward-motion sequences.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PairsConfig {
    pub overlap: usize,
    pub quadratic: bool,
    pub quadratic_t: f64,
}

impl Default for PairsConfig {
    fn default() -> PairsConfig {
        PairsConfig {
            overlap: 1,
            quadratic: false,
            quadratic_t: 1.0,
        }
    }
}

impl PairsConfig {
    /// Preset used by the video pipeline.
    pub fn sequential_video() -> PairsConfig {
        PairsConfig {
            overlap: 10,
            quadratic: true,
            quadratic_t: 0.6,
        }
    }
}

/// Where the frame names come from.
#[derive(Debug, Clone)]
pub enum ImageListSource {
    /// Text file, one name per line.
    File(PathBuf),
    /// Already-listed names.
    Names(Vec<String>),
}

/// Shift values for `config`, deduplicated and sorted ascending.
///
/// Sorted order makes pair emission deterministic for a given frame list.
pub fn shift_levels(config: &PairsConfig) -> Vec<usize> {
    let mut shifts: Vec<usize> = (0..config.overlap)
        .map(|d| {
            if config.quadratic {
                2f64.powf(d as f64 * config.quadratic_t).floor() as usize
            } else {
                d
            }
        })
        .collect();
    shifts.sort_unstable();
    shifts.dedup();
    shifts
}

/// Emits `(names[i], names[i + s])` for every index `i` and shift `s` with
/// `i + s` in range. Outer loop over `i` ascending, inner over shifts
/// ascending. Names are sorted first; shift 0 yields self-pairs, which the
/// matcher accepts as a base case.
pub fn sequential_pairs(names: &[String], config: &PairsConfig) -> Vec<(String, String)> {
    let mut names: Vec<String> = names.to_vec();
    names.sort();

    let shifts = shift_levels(config);
    let mut pairs = Vec::new();
    for (i, n1) in names.iter().enumerate() {
        for &shift in &shifts {
            let j = i + shift;
            if j < names.len() {
                pairs.push((n1.clone(), names[j].clone()));
            }
        }
    }
    pairs
}

/// Writes one pair per line, space separated, no trailing newline.
pub fn write_pairs(output: &Path, pairs: &[(String, String)]) -> Result<()> {
    let body = pairs
        .iter()
        .map(|(a, b)| format!("{} {}", a, b))
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(output, body)?;
    Ok(())
}

/// Generates the sequential pair file for the matcher.
///
/// Exactly one name source must be usable: an explicit `image_list`, or
/// `feature_names` previously listed from the feature store. Neither being
/// given is a configuration error. An empty name list is not an error; it
/// produces an empty pair file and a count of 0.
pub fn pairs_from_sequential(
    output: &Path,
    image_list: Option<ImageListSource>,
    feature_names: Option<Vec<String>>,
    config: &PairsConfig,
) -> Result<usize> {
    let names = match (image_list, feature_names) {
        (Some(ImageListSource::File(path)), _) => read_image_list(&path)?,
        (Some(ImageListSource::Names(names)), _) => names,
        (None, Some(names)) => names,
        (None, None) => {
            return Err(Error::Config(
                "provide either a list of images or a feature source".to_string(),
            ));
        }
    };

    let pairs = sequential_pairs(&names, config);
    log::info!("found {} pairs", pairs.len());
    write_pairs(output, &pairs)?;
    Ok(pairs.len())
}

use std::path::{Path, PathBuf};
use std::process::Command;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::masks::MOVING_CLASSES;

/// Feature extraction options. Constructed once per run; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub max_keypoints: u32,
    pub resize_max: u32,
}

impl Default for FeatureConfig {
    fn default() -> FeatureConfig {
        FeatureConfig {
            max_keypoints: 1024,
            resize_max: 1280,
        }
    }
}

/// Matcher pruning thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub depth_confidence: f64,
    pub width_confidence: f64,
}

impl Default for MatcherConfig {
    fn default() -> MatcherConfig {
        MatcherConfig {
            depth_confidence: 0.90,
            width_confidence: 0.95,
        }
    }
}

/// How the mapper groups images into cameras.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CameraMode {
    Auto,
    /// All images share one intrinsic model. The only mode the video
    /// pipeline uses: every frame comes from the same camera.
    #[default]
    Single,
    PerFolder,
    PerImage,
}

impl CameraMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraMode::Auto => "AUTO",
            CameraMode::Single => "SINGLE",
            CameraMode::PerFolder => "PER_FOLDER",
            CameraMode::PerImage => "PER_IMAGE",
        }
    }
}

/// Intrinsic model identifiers understood by the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CameraModelId {
    #[serde(rename = "SIMPLE_PINHOLE")]
    SimplePinhole,
    #[serde(rename = "PINHOLE")]
    Pinhole,
    #[serde(rename = "SIMPLE_RADIAL")]
    SimpleRadial,
    /// f, cx, cy, k. Default: dashcam and action-camera footage is fisheye.
    #[default]
    #[serde(rename = "SIMPLE_RADIAL_FISHEYE")]
    SimpleRadialFisheye,
    #[serde(rename = "OPENCV_FISHEYE")]
    OpenCvFisheye,
}

impl CameraModelId {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraModelId::SimplePinhole => "SIMPLE_PINHOLE",
            CameraModelId::Pinhole => "PINHOLE",
            CameraModelId::SimpleRadial => "SIMPLE_RADIAL",
            CameraModelId::SimpleRadialFisheye => "SIMPLE_RADIAL_FISHEYE",
            CameraModelId::OpenCvFisheye => "OPENCV_FISHEYE",
        }
    }
}

/// Per-image options handed to the mapper.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageOptions {
    pub camera_model: CameraModelId,
    /// Fixed intrinsics. When set, pair with
    /// [`MapperOptions::fixed_intrinsics`] so bundle adjustment treats them
    /// as ground truth.
    pub camera_params: Option<Vec<f64>>,
    /// Keep-mask directory; pixels that are 0 are excluded from matching.
    pub mask_dir: Option<PathBuf>,
}

/// Bundle-adjustment refinement switches.
#[derive(Debug, Clone, PartialEq)]
pub struct MapperOptions {
    pub ignore_watermarks: bool,
    pub refine_focal_length: bool,
    pub refine_principal_point: bool,
    pub refine_extra_params: bool,
}

impl Default for MapperOptions {
    fn default() -> MapperOptions {
        MapperOptions {
            ignore_watermarks: false,
            refine_focal_length: true,
            refine_principal_point: true,
            refine_extra_params: true,
        }
    }
}

impl MapperOptions {
    /// Intrinsics are ground truth: no refinement of focal length,
    /// principal point, or distortion.
    pub fn fixed_intrinsics() -> MapperOptions {
        MapperOptions {
            ignore_watermarks: false,
            refine_focal_length: false,
            refine_principal_point: false,
            refine_extra_params: false,
        }
    }
}

/// Parses a comma-separated intrinsic parameter string, e.g.
/// `"437.2,640.0,360.0,-0.03"` for SIMPLE_RADIAL_FISHEYE.
pub fn parse_camera_params(s: &str) -> Result<Vec<f64>> {
    s.split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| Error::Config(format!("bad camera parameter: {:?}", part)))
        })
        .collect()
}

pub trait FeatureExtractor {
    /// Extracts local features for every image in `image_dir` into the
    /// feature store at `features`.
    fn extract(&self, image_dir: &Path, features: &Path, config: &FeatureConfig) -> Result<()>;
}

pub trait Matcher {
    /// Matches every pair listed in `pairs` using the feature store, writing
    /// the match store at `matches`.
    fn match_pairs(
        &self,
        pairs: &Path,
        features: &Path,
        matches: &Path,
        config: &MatcherConfig,
    ) -> Result<()>;
}

pub trait Reconstructor {
    /// Runs incremental mapping and bundle adjustment, leaving the
    /// reconstruction (including `poses.json`) in `sfm_dir`.
    #[allow(clippy::too_many_arguments)]
    fn reconstruct(
        &self,
        sfm_dir: &Path,
        image_dir: &Path,
        pairs: &Path,
        features: &Path,
        matches: &Path,
        camera_mode: CameraMode,
        image_options: &ImageOptions,
        mapper_options: &MapperOptions,
    ) -> Result<()>;
}

pub trait Segmenter {
    /// Segments independently-moving objects in one frame. Nonzero pixels in
    /// the returned mask are movers.
    fn moving_object_mask(&self, image: &Path) -> Result<GrayImage>;
}

fn run_tool(program: &str, args: &[String]) -> Result<()> {
    which::which(program).map_err(|_| Error::ToolNotFound {
        tool: program.to_string(),
    })?;
    log::debug!("running {} {}", program, args.join(" "));
    let output = Command::new(program).args(args).output()?;
    if output.status.success() {
        Ok(())
    } else {
        Err(Error::ToolFailed {
            tool: program.to_string(),
            status: output.status.to_string(),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Feature extractor backed by an external executable.
///
/// Contract: `<program> --image-dir <dir> --features <file>
/// --max-keypoints <n> --resize-max <n>`.
#[derive(Debug, Clone)]
pub struct CommandFeatureExtractor {
    pub program: String,
}

impl CommandFeatureExtractor {
    pub fn new(program: impl Into<String>) -> CommandFeatureExtractor {
        CommandFeatureExtractor {
            program: program.into(),
        }
    }
}

impl FeatureExtractor for CommandFeatureExtractor {
    fn extract(&self, image_dir: &Path, features: &Path, config: &FeatureConfig) -> Result<()> {
        let args = vec![
            "--image-dir".to_string(),
            image_dir.display().to_string(),
            "--features".to_string(),
            features.display().to_string(),
            "--max-keypoints".to_string(),
            config.max_keypoints.to_string(),
            "--resize-max".to_string(),
            config.resize_max.to_string(),
        ];
        run_tool(&self.program, &args)
    }
}

/// Matcher backed by an external executable.
///
/// Contract: `<program> --pairs <file> --features <file> --matches <file>
/// --depth-confidence <x> --width-confidence <x>`.
#[derive(Debug, Clone)]
pub struct CommandMatcher {
    pub program: String,
}

impl CommandMatcher {
    pub fn new(program: impl Into<String>) -> CommandMatcher {
        CommandMatcher {
            program: program.into(),
        }
    }
}

impl Matcher for CommandMatcher {
    fn match_pairs(
        &self,
        pairs: &Path,
        features: &Path,
        matches: &Path,
        config: &MatcherConfig,
    ) -> Result<()> {
        let args = vec![
            "--pairs".to_string(),
            pairs.display().to_string(),
            "--features".to_string(),
            features.display().to_string(),
            "--matches".to_string(),
            matches.display().to_string(),
            "--depth-confidence".to_string(),
            config.depth_confidence.to_string(),
            "--width-confidence".to_string(),
            config.width_confidence.to_string(),
        ];
        run_tool(&self.program, &args)
    }
}

/// Mapper backed by an external executable.
///
/// Contract: `<program> --sfm-dir <dir> --image-dir <dir> --pairs <file>
/// --features <file> --matches <file> --camera-mode <mode>
/// --camera-model <model> [--camera-params a,b,..] [--mask-dir <dir>]
/// [--ignore-watermarks] [--no-refine-focal-length]
/// [--no-refine-principal-point] [--no-refine-extra-params]`.
/// Must write `poses.json` into the sfm dir on success.
#[derive(Debug, Clone)]
pub struct CommandReconstructor {
    pub program: String,
}

impl CommandReconstructor {
    pub fn new(program: impl Into<String>) -> CommandReconstructor {
        CommandReconstructor {
            program: program.into(),
        }
    }
}

impl Reconstructor for CommandReconstructor {
    fn reconstruct(
        &self,
        sfm_dir: &Path,
        image_dir: &Path,
        pairs: &Path,
        features: &Path,
        matches: &Path,
        camera_mode: CameraMode,
        image_options: &ImageOptions,
        mapper_options: &MapperOptions,
    ) -> Result<()> {
        let mut args = vec![
            "--sfm-dir".to_string(),
            sfm_dir.display().to_string(),
            "--image-dir".to_string(),
            image_dir.display().to_string(),
            "--pairs".to_string(),
            pairs.display().to_string(),
            "--features".to_string(),
            features.display().to_string(),
            "--matches".to_string(),
            matches.display().to_string(),
            "--camera-mode".to_string(),
            camera_mode.as_str().to_string(),
            "--camera-model".to_string(),
            image_options.camera_model.as_str().to_string(),
        ];
        if let Some(params) = &image_options.camera_params {
            let joined = params
                .iter()
                .map(f64::to_string)
                .collect::<Vec<_>>()
                .join(",");
            args.push("--camera-params".to_string());
            args.push(joined);
        }
        if let Some(mask_dir) = &image_options.mask_dir {
            args.push("--mask-dir".to_string());
            args.push(mask_dir.display().to_string());
        }
        if mapper_options.ignore_watermarks {
            args.push("--ignore-watermarks".to_string());
        }
        if !mapper_options.refine_focal_length {
            args.push("--no-refine-focal-length".to_string());
        }
        if !mapper_options.refine_principal_point {
            args.push("--no-refine-principal-point".to_string());
        }
        if !mapper_options.refine_extra_params {
            args.push("--no-refine-extra-params".to_string());
        }
        run_tool(&self.program, &args)
    }
}

/// Segmentation model backed by an external executable.
///
/// Contract: `<program> --input <image> --output <mask.png>
/// --classes a,b,.. --confidence <x>`; the tool writes a grayscale mask with
/// nonzero pixels on detected instances of the requested classes.
#[derive(Debug, Clone)]
pub struct CommandSegmenter {
    pub program: String,
    pub classes: Vec<String>,
    pub confidence: f64,
}

impl CommandSegmenter {
    pub fn new(program: impl Into<String>) -> CommandSegmenter {
        CommandSegmenter {
            program: program.into(),
            classes: MOVING_CLASSES.iter().map(|c| c.to_string()).collect(),
            confidence: 0.5,
        }
    }
}

impl Segmenter for CommandSegmenter {
    fn moving_object_mask(&self, image: &Path) -> Result<GrayImage> {
        let scratch = tempfile::Builder::new()
            .prefix("mover-mask-")
            .suffix(".png")
            .tempfile()?;
        let args = vec![
            "--input".to_string(),
            image.display().to_string(),
            "--output".to_string(),
            scratch.path().display().to_string(),
            "--classes".to_string(),
            self.classes.join(","),
            "--confidence".to_string(),
            self.confidence.to_string(),
        ];
        run_tool(&self.program, &args)?;
        let mask = image::open(scratch.path())?.to_luma8();
        Ok(mask)
    }
}

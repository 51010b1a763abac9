use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engines::{FeatureConfig, MatcherConfig};
use crate::error::Result;
use crate::pairs::PairsConfig;
use crate::sampler::SamplerConfig;
use crate::trajectory::{DEFAULT_FRAME_RATE, HEADING_WINDOW};

/// External executables backing the engine traits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub extractor: String,
    pub matcher: String,
    pub reconstructor: String,
    pub segmenter: String,
}

impl Default for ToolPaths {
    fn default() -> ToolPaths {
        ToolPaths {
            extractor: "sfm-extract".to_string(),
            matcher: "sfm-match".to_string(),
            reconstructor: "sfm-mapper".to_string(),
            segmenter: "segment-movers".to_string(),
        }
    }
}

/// Everything the pipeline needs, as one immutable value object.
///
/// Deserializes from a JSON file where every field is optional; omitted
/// fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sampler: SamplerConfig,
    pub pairs: PairsConfig,
    pub feature: FeatureConfig,
    pub matcher: MatcherConfig,
    pub frame_rate: f64,
    pub heading_window: usize,
    pub tools: ToolPaths,
}

impl Default for PipelineConfig {
    fn default() -> PipelineConfig {
        PipelineConfig {
            sampler: SamplerConfig::default(),
            pairs: PairsConfig::sequential_video(),
            feature: FeatureConfig::default(),
            matcher: MatcherConfig::default(),
            frame_rate: DEFAULT_FRAME_RATE,
            heading_window: HEADING_WINDOW,
            tools: ToolPaths::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json(path: &Path) -> Result<PipelineConfig> {
        crate::io::object_from_json(path)
    }
}

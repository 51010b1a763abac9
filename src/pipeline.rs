use std::path::PathBuf;

use serde::Serialize;

use crate::config::PipelineConfig;
use crate::engines::{
    CameraMode, FeatureExtractor, ImageOptions, MapperOptions, Matcher, Reconstructor, Segmenter,
};
use crate::error::Result;
use crate::io::{list_image_names, load_trajectory};
use crate::masks::mask_images;
use crate::pairs::pairs_from_sequential;
use crate::plot::scatter_png;
use crate::sampler::sample_video;
use crate::trajectory::{
    curvature_series, hampel_filter, project_principal_plane, velocity_series,
};

/// Working-directory layout for one input item: everything derived from a
/// video `v.mp4` lives under `v.mp4.sfm/`.
#[derive(Debug, Clone)]
pub struct ItemPaths {
    root: PathBuf,
}

impl ItemPaths {
    pub fn new(input: &str) -> ItemPaths {
        ItemPaths {
            root: PathBuf::from(format!("{}.sfm", input)),
        }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn masks_dir(&self) -> PathBuf {
        self.root.join("masks")
    }

    pub fn features(&self) -> PathBuf {
        self.root.join("features.h5")
    }

    pub fn pairs(&self) -> PathBuf {
        self.root.join("pairs.txt")
    }

    pub fn matches(&self) -> PathBuf {
        self.root.join("matches.h5")
    }

    pub fn sfm_dir(&self) -> PathBuf {
        self.root.join("sfm")
    }

    pub fn track_plot(&self) -> PathBuf {
        self.root.join("track.png")
    }

    pub fn velocity_plot(&self) -> PathBuf {
        self.root.join("vel.png")
    }

    pub fn curvature_plot(&self) -> PathBuf {
        self.root.join("cur.png")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Preprocess,
    Mask,
    Sfm,
    Plot,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Preprocess => "preprocess",
            Stage::Mask => "mask",
            Stage::Sfm => "sfm",
            Stage::Plot => "plot",
        }
    }
}

/// Outcome of one stage on one input. Failures carry the rendered error;
/// nothing is swallowed beyond logging.
#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub input: String,
    pub stage: Stage,
    pub success: bool,
    pub error: Option<String>,
}

impl ItemReport {
    fn ok(input: &str, stage: Stage) -> ItemReport {
        ItemReport {
            input: input.to_string(),
            stage,
            success: true,
            error: None,
        }
    }

    fn failed(input: &str, stage: Stage, error: &crate::error::Error) -> ItemReport {
        ItemReport {
            input: input.to_string(),
            stage,
            success: false,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub created: String,
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    pub fn new(items: Vec<ItemReport>) -> BatchReport {
        let created = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        BatchReport { created, items }
    }

    pub fn failed_count(&self) -> usize {
        self.items.iter().filter(|i| !i.success).count()
    }

    pub fn log_summary(&self) {
        let failed = self.failed_count();
        log::info!("{} stage runs, {} failed", self.items.len(), failed);
        for item in self.items.iter().filter(|i| !i.success) {
            log::warn!(
                "{} {}: {}",
                item.stage.as_str(),
                item.input,
                item.error.as_deref().unwrap_or("unknown")
            );
        }
    }
}

/// Sequences the per-item stages against injected engines.
///
/// Items are independent: a failure is caught, logged, recorded in the
/// report, and the batch moves on.
pub struct Pipeline<'a> {
    pub config: PipelineConfig,
    pub extractor: &'a dyn FeatureExtractor,
    pub matcher: &'a dyn Matcher,
    pub reconstructor: &'a dyn Reconstructor,
    pub segmenter: &'a dyn Segmenter,
}

impl Pipeline<'_> {
    pub fn preprocess(&self, inputs: &[String]) -> Vec<ItemReport> {
        self.run_stage(Stage::Preprocess, inputs, |input| {
            let paths = ItemPaths::new(input);
            sample_video(
                std::path::Path::new(input),
                &paths.images_dir(),
                &self.config.sampler,
            )?;
            Ok(())
        })
    }

    pub fn mask(&self, inputs: &[String]) -> Vec<ItemReport> {
        self.run_stage(Stage::Mask, inputs, |input| {
            let paths = ItemPaths::new(input);
            mask_images(&paths.images_dir(), &paths.masks_dir(), self.segmenter)?;
            Ok(())
        })
    }

    pub fn sfm(&self, inputs: &[String], cparam: Option<&[f64]>) -> Vec<ItemReport> {
        self.run_stage(Stage::Sfm, inputs, |input| self.sfm_item(input, cparam))
    }

    pub fn plot(&self, inputs: &[String]) -> Vec<ItemReport> {
        self.run_stage(Stage::Plot, inputs, |input| self.plot_item(input))
    }

    /// All four stages in sequence, each over the whole batch.
    pub fn run(&self, inputs: &[String], cparam: Option<&[f64]>) -> BatchReport {
        let mut items = self.preprocess(inputs);
        items.extend(self.mask(inputs));
        items.extend(self.sfm(inputs, cparam));
        items.extend(self.plot(inputs));
        BatchReport::new(items)
    }

    fn run_stage<F>(&self, stage: Stage, inputs: &[String], item_fn: F) -> Vec<ItemReport>
    where
        F: Fn(&str) -> Result<()>,
    {
        inputs
            .iter()
            .map(|input| {
                log::info!("{}: {}", stage.as_str(), input);
                match item_fn(input) {
                    Ok(()) => ItemReport::ok(input, stage),
                    Err(e) => {
                        log::error!("{} failed for {}: {}", stage.as_str(), input, e);
                        ItemReport::failed(input, stage, &e)
                    }
                }
            })
            .collect()
    }

    fn sfm_item(&self, input: &str, cparam: Option<&[f64]>) -> Result<()> {
        let paths = ItemPaths::new(input);

        log::info!("extract features");
        self.extractor
            .extract(&paths.images_dir(), &paths.features(), &self.config.feature)?;

        log::info!("create sequential pairs");
        let names = list_image_names(&paths.images_dir())?;
        pairs_from_sequential(&paths.pairs(), None, Some(names), &self.config.pairs)?;

        log::info!("match features");
        self.matcher.match_pairs(
            &paths.pairs(),
            &paths.features(),
            &paths.matches(),
            &self.config.matcher,
        )?;

        let mask_dir = paths.masks_dir();
        let image_options = ImageOptions {
            camera_params: cparam.map(|p| p.to_vec()),
            mask_dir: mask_dir.is_dir().then_some(mask_dir),
            ..ImageOptions::default()
        };
        let mut mapper_options = if cparam.is_some() {
            MapperOptions::fixed_intrinsics()
        } else {
            MapperOptions::default()
        };
        mapper_options.ignore_watermarks = true;

        log::info!("reconstruct");
        self.reconstructor.reconstruct(
            &paths.sfm_dir(),
            &paths.images_dir(),
            &paths.pairs(),
            &paths.features(),
            &paths.matches(),
            CameraMode::Single,
            &image_options,
            &mapper_options,
        )
    }

    fn plot_item(&self, input: &str) -> Result<()> {
        let paths = ItemPaths::new(input);

        let trajectory = load_trajectory(&paths.sfm_dir())?;
        log::info!("{} registered images", trajectory.len());

        let track = project_principal_plane(&trajectory.centers());
        let track_points: Vec<(f64, f64)> = track.iter().map(|p| (p.x, p.y)).collect();
        scatter_png(&paths.track_plot(), &track_points, true)?;
        log::info!("{}", paths.track_plot().display());

        let vel = hampel_filter(&velocity_series(&track, self.config.frame_rate));
        scatter_png(&paths.velocity_plot(), &vel, false)?;
        log::info!("{}", paths.velocity_plot().display());

        let cur = hampel_filter(&curvature_series(
            &track,
            self.config.frame_rate,
            self.config.heading_window,
        ));
        scatter_png(&paths.curvature_plot(), &cur, false)?;
        log::info!("{}", paths.curvature_plot().display());

        Ok(())
    }
}

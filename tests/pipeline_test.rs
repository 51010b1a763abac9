use std::path::Path;
use std::sync::Mutex;

use image::{GrayImage, Luma};
use sequential_sfm::config::PipelineConfig;
use sequential_sfm::engines::{
    CameraMode, CameraModelId, FeatureConfig, FeatureExtractor, ImageOptions, MapperOptions,
    Matcher, MatcherConfig, Reconstructor, Segmenter,
};
use sequential_sfm::error::{Error, Result};
use sequential_sfm::io::object_to_json;
use sequential_sfm::masks::{keep_mask, mask_images};
use sequential_sfm::pipeline::{ItemPaths, Pipeline, Stage};
use sequential_sfm::types::CameraPose;

/// Engines that record their calls and fabricate artifacts, so the
/// orchestrator is testable without any external tooling.
#[derive(Default)]
struct StubEngines {
    calls: Mutex<Vec<String>>,
    captured_image_options: Mutex<Option<ImageOptions>>,
    captured_mapper_options: Mutex<Option<MapperOptions>>,
    fail_reconstruction_for: Option<String>,
}

impl StubEngines {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl FeatureExtractor for StubEngines {
    fn extract(&self, image_dir: &Path, features: &Path, _config: &FeatureConfig) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("extract {}", image_dir.display()));
        std::fs::write(features, b"features")?;
        Ok(())
    }
}

impl Matcher for StubEngines {
    fn match_pairs(
        &self,
        pairs: &Path,
        _features: &Path,
        matches: &Path,
        _config: &MatcherConfig,
    ) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("match {}", pairs.display()));
        std::fs::write(matches, b"matches")?;
        Ok(())
    }
}

impl Reconstructor for StubEngines {
    fn reconstruct(
        &self,
        sfm_dir: &Path,
        _image_dir: &Path,
        _pairs: &Path,
        _features: &Path,
        _matches: &Path,
        camera_mode: CameraMode,
        image_options: &ImageOptions,
        mapper_options: &MapperOptions,
    ) -> Result<()> {
        assert_eq!(camera_mode, CameraMode::Single);
        self.calls
            .lock()
            .unwrap()
            .push(format!("reconstruct {}", sfm_dir.display()));
        *self.captured_image_options.lock().unwrap() = Some(image_options.clone());
        *self.captured_mapper_options.lock().unwrap() = Some(mapper_options.clone());

        if let Some(marker) = &self.fail_reconstruction_for {
            if sfm_dir.display().to_string().contains(marker.as_str()) {
                return Err(Error::Config("insufficient overlap".to_string()));
            }
        }

        std::fs::create_dir_all(sfm_dir)?;
        // A small circular track in a tilted plane.
        let poses: Vec<CameraPose> = (0..24)
            .map(|i| {
                let a = i as f64 * 0.25;
                let center = [a.cos() * 4.0, a.sin() * 4.0, 0.2 * a.sin()];
                CameraPose::new((i + 1) as u32, [0.0; 3], [-center[0], -center[1], -center[2]])
            })
            .collect();
        object_to_json(&sfm_dir.join("poses.json"), &poses)
    }
}

impl Segmenter for StubEngines {
    fn moving_object_mask(&self, image: &Path) -> Result<GrayImage> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("segment {}", image.display()));
        let mut movers = GrayImage::new(8, 8);
        movers.put_pixel(2, 3, Luma([200u8]));
        Ok(movers)
    }
}

fn fake_frames(images_dir: &Path, count: usize) {
    std::fs::create_dir_all(images_dir).unwrap();
    for i in 0..count {
        GrayImage::new(8, 8)
            .save(images_dir.join(format!("{:04}.png", i + 1)))
            .unwrap();
    }
}

fn make_pipeline(engines: &StubEngines) -> Pipeline<'_> {
    Pipeline {
        config: PipelineConfig::default(),
        extractor: engines,
        matcher: engines,
        reconstructor: engines,
        segmenter: engines,
    }
}

#[test]
fn test_item_paths_layout() {
    let paths = ItemPaths::new("clips/drive.mp4");
    assert_eq!(
        paths.images_dir(),
        Path::new("clips/drive.mp4.sfm/images")
    );
    assert_eq!(paths.masks_dir(), Path::new("clips/drive.mp4.sfm/masks"));
    assert_eq!(paths.pairs(), Path::new("clips/drive.mp4.sfm/pairs.txt"));
    assert_eq!(paths.features(), Path::new("clips/drive.mp4.sfm/features.h5"));
    assert_eq!(paths.matches(), Path::new("clips/drive.mp4.sfm/matches.h5"));
    assert_eq!(paths.sfm_dir(), Path::new("clips/drive.mp4.sfm/sfm"));
    assert_eq!(paths.track_plot(), Path::new("clips/drive.mp4.sfm/track.png"));
}

#[test]
fn test_keep_mask_inverts_movers() {
    let mut movers = GrayImage::new(4, 4);
    movers.put_pixel(1, 1, Luma([255u8]));
    movers.put_pixel(2, 0, Luma([1u8]));

    let keep = keep_mask(&movers);
    assert_eq!(keep.get_pixel(1, 1)[0], 0);
    assert_eq!(keep.get_pixel(2, 0)[0], 0);
    assert_eq!(keep.get_pixel(0, 0)[0], 255);
    assert_eq!(keep.get_pixel(3, 3)[0], 255);
}

#[test]
fn test_mask_stage_writes_one_mask_per_frame() {
    let dir = tempfile::tempdir().unwrap();
    let images_dir = dir.path().join("images");
    let masks_dir = dir.path().join("masks");
    fake_frames(&images_dir, 3);

    let engines = StubEngines::default();
    let count = mask_images(&images_dir, &masks_dir, &engines).unwrap();
    assert_eq!(count, 3);

    for i in 0..3 {
        let mask_path = masks_dir.join(format!("{:04}.png", i + 1));
        let mask = image::open(&mask_path).unwrap().to_luma8();
        assert_eq!(mask.get_pixel(2, 3)[0], 0);
        assert_eq!(mask.get_pixel(0, 0)[0], 255);
    }
}

#[test]
fn test_sfm_stage_runs_extract_pairs_match_reconstruct() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("drive.mp4").display().to_string();
    let paths = ItemPaths::new(&input);
    fake_frames(&paths.images_dir(), 12);

    let engines = StubEngines::default();
    let pipeline = make_pipeline(&engines);
    let reports = pipeline.sfm(&[input.clone()], None);

    assert_eq!(reports.len(), 1);
    assert!(reports[0].success, "{:?}", reports[0].error);
    assert_eq!(reports[0].stage, Stage::Sfm);

    let calls = engines.calls();
    assert!(calls[0].starts_with("extract"));
    assert!(calls[1].starts_with("match"));
    assert!(calls[2].starts_with("reconstruct"));

    // Pipeline preset: quadratic overlap scheduling over the 12 frames with
    // shifts {1,2,3,5,8}: 11+10+9+7+4 pairs.
    let pairs = std::fs::read_to_string(paths.pairs()).unwrap();
    assert_eq!(pairs.lines().count(), 41);
    assert_eq!(pairs.lines().next().unwrap(), "0001.png 0002.png");

    // No cparam: intrinsics refined freely, watermarks still ignored.
    let mapper = engines.captured_mapper_options.lock().unwrap().clone().unwrap();
    assert!(mapper.ignore_watermarks);
    assert!(mapper.refine_focal_length);
    let image_options = engines.captured_image_options.lock().unwrap().clone().unwrap();
    assert_eq!(image_options.camera_model, CameraModelId::SimpleRadialFisheye);
    assert!(image_options.camera_params.is_none());
    assert!(image_options.mask_dir.is_none());
}

#[test]
fn test_sfm_stage_with_fixed_intrinsics_and_masks() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("drive.mp4").display().to_string();
    let paths = ItemPaths::new(&input);
    fake_frames(&paths.images_dir(), 4);
    std::fs::create_dir_all(paths.masks_dir()).unwrap();

    let engines = StubEngines::default();
    let pipeline = make_pipeline(&engines);
    let cparam = [437.2, 640.0, 360.0, -0.03];
    let reports = pipeline.sfm(&[input], Some(&cparam));
    assert!(reports[0].success, "{:?}", reports[0].error);

    let mapper = engines.captured_mapper_options.lock().unwrap().clone().unwrap();
    assert!(mapper.ignore_watermarks);
    assert!(!mapper.refine_focal_length);
    assert!(!mapper.refine_principal_point);
    assert!(!mapper.refine_extra_params);

    let image_options = engines.captured_image_options.lock().unwrap().clone().unwrap();
    assert_eq!(image_options.camera_params.as_deref(), Some(&cparam[..]));
    assert_eq!(image_options.mask_dir, Some(paths.masks_dir()));
}

#[test]
fn test_plot_stage_writes_three_figures() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("drive.mp4").display().to_string();
    let paths = ItemPaths::new(&input);
    fake_frames(&paths.images_dir(), 4);

    let engines = StubEngines::default();
    let pipeline = make_pipeline(&engines);
    assert!(pipeline.sfm(&[input.clone()], None)[0].success);

    let reports = pipeline.plot(&[input]);
    assert!(reports[0].success, "{:?}", reports[0].error);
    for path in [paths.track_plot(), paths.velocity_plot(), paths.curvature_plot()] {
        let img = image::open(&path).unwrap();
        assert!(img.width() > 0);
    }
}

#[test]
fn test_plot_stage_fails_per_item_without_reconstruction() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("missing.mp4").display().to_string();

    let engines = StubEngines::default();
    let pipeline = make_pipeline(&engines);
    let reports = pipeline.plot(&[input]);
    assert!(!reports[0].success);
    assert!(reports[0].error.as_deref().unwrap().contains("poses.json"));
}

#[test]
fn test_item_failure_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad.mp4").display().to_string();
    let good = dir.path().join("good.mp4").display().to_string();
    fake_frames(&ItemPaths::new(&bad).images_dir(), 4);
    fake_frames(&ItemPaths::new(&good).images_dir(), 4);

    let engines = StubEngines {
        fail_reconstruction_for: Some("bad.mp4".to_string()),
        ..StubEngines::default()
    };
    let pipeline = make_pipeline(&engines);
    let reports = pipeline.sfm(&[bad, good], None);

    assert_eq!(reports.len(), 2);
    assert!(!reports[0].success);
    assert!(
        reports[0]
            .error
            .as_deref()
            .unwrap()
            .contains("insufficient overlap")
    );
    assert!(reports[1].success);

    // Both items reached the reconstructor.
    let reconstruct_calls = engines
        .calls()
        .iter()
        .filter(|c| c.starts_with("reconstruct"))
        .count();
    assert_eq!(reconstruct_calls, 2);
}

#[test]
fn test_batch_report_counts_failures() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("absent.mp4").display().to_string();

    let engines = StubEngines::default();
    let pipeline = make_pipeline(&engines);
    let report = sequential_sfm::pipeline::BatchReport::new(pipeline.plot(&[input]));
    assert_eq!(report.failed_count(), 1);
    assert!(!report.created.is_empty());

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"stage\":\"plot\""));
    assert!(json.contains("\"success\":false"));
}

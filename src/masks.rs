use std::path::Path;

use image::{GrayImage, Luma};
use indicatif::ProgressIterator;

use crate::engines::Segmenter;
use crate::error::Result;

/// Classes whose pixels are excluded from matching. Independently-moving
/// objects violate the static-scene assumption and drag the reconstruction
/// with them.
pub const MOVING_CLASSES: [&str; 6] = ["person", "bicycle", "car", "motorcycle", "bus", "truck"];

/// Converts a moving-object mask into the keep-mask the matcher consumes:
/// 255 on static scene, 0 wherever a mover was detected.
pub fn keep_mask(movers: &GrayImage) -> GrayImage {
    GrayImage::from_fn(movers.width(), movers.height(), |x, y| {
        if movers.get_pixel(x, y)[0] > 0 {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    })
}

/// Runs the segmenter over every frame in `image_dir`, writing one keep-mask
/// PNG per frame into `masks_dir` under the frame's file name.
///
/// Returns the number of masks written.
pub fn mask_images(image_dir: &Path, masks_dir: &Path, segmenter: &dyn Segmenter) -> Result<usize> {
    std::fs::create_dir_all(masks_dir)?;

    let names = crate::io::list_image_names(image_dir)?;
    log::info!("masking {} frames", names.len());

    for name in names.iter().progress_count(names.len() as u64) {
        let movers = segmenter.moving_object_mask(&image_dir.join(name))?;
        keep_mask(&movers).save(masks_dir.join(name))?;
    }
    Ok(names.len())
}

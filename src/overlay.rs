//! Render detection boxes onto the source image.

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use std::path::Path;

use crate::bbox::BoundingBox;

/// Stroke color for detection outlines.
pub const STROKE_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Stroke width in pixels for detection outlines.
pub const STROKE_WIDTH: u32 = 5;

/// Load the image at `image_path`, outline every box, and write the
/// annotated copy to `out_path`. The output format follows the extension
/// of `out_path`.
pub fn annotate(image_path: &Path, boxes: &[BoundingBox], out_path: &Path) -> Result<()> {
    let img = image::open(image_path)
        .with_context(|| format!("open image {}", image_path.display()))?;
    let mut canvas = img.into_rgba8();
    draw_boxes(&mut canvas, boxes, STROKE_COLOR, STROKE_WIDTH);
    canvas
        .save(out_path)
        .with_context(|| format!("write annotated image {}", out_path.display()))?;
    Ok(())
}

/// Outline each box border on `img`. Boxes are clamped to the image bounds;
/// boxes entirely outside the image, or with non-finite bounds, are skipped.
pub fn draw_boxes(img: &mut RgbaImage, boxes: &[BoundingBox], color: Rgba<u8>, thickness: u32) {
    for bbox in boxes {
        if let Some(rect) = clamp_to_pixels(bbox, img.dimensions()) {
            stroke_rect(img, rect, color, thickness);
        }
    }
}

/// Clamp a box to pixel coordinates inside `dims`. Returns `None` when the
/// box has no overlap with the image or its bounds are not finite.
fn clamp_to_pixels(bbox: &BoundingBox, dims: (u32, u32)) -> Option<[u32; 4]> {
    let (w, h) = dims;
    if w == 0 || h == 0 {
        return None;
    }
    let finite = [bbox.xmin, bbox.ymin, bbox.xmax, bbox.ymax]
        .iter()
        .all(|v| v.is_finite());
    if !finite || bbox.xmin > bbox.xmax || bbox.ymin > bbox.ymax {
        return None;
    }
    if bbox.xmax < 0.0 || bbox.ymax < 0.0 {
        return None;
    }
    if bbox.xmin >= w as f64 || bbox.ymin >= h as f64 {
        return None;
    }

    let clamp = |v: f64, max: u32| -> u32 { v.max(0.0).min((max - 1) as f64) as u32 };
    Some([
        clamp(bbox.xmin, w),
        clamp(bbox.ymin, h),
        clamp(bbox.xmax, w),
        clamp(bbox.ymax, h),
    ])
}

/// Draw a rectangle border of the given thickness, growing inward.
fn stroke_rect(img: &mut RgbaImage, rect: [u32; 4], color: Rgba<u8>, thickness: u32) {
    let [x0, y0, x1, y1] = rect;
    for inset in 0..thickness {
        let left = x0.saturating_add(inset);
        let top = y0.saturating_add(inset);
        let right = x1.saturating_sub(inset);
        let bottom = y1.saturating_sub(inset);
        if left > right || top > bottom {
            break;
        }
        for x in left..=right {
            img.put_pixel(x, top, color);
            img.put_pixel(x, bottom, color);
        }
        for y in top..=bottom {
            img.put_pixel(left, y, color);
            img.put_pixel(right, y, color);
        }
    }
}

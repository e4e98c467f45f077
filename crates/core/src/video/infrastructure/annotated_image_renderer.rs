use image::imageops::{self, FilterType};

use crate::pipeline::label_overlay::OverlayLabel;
use crate::shared::constants::LABEL_BORDER_WIDTH;
use crate::shared::frame::Frame;
use crate::shared::geometry::{Rect, Size};

const BACKGROUND: [u8; 3] = [0, 0, 0];
const OUTLINE: [u8; 3] = [255, 255, 255];

/// Draws `image` aspect-fit into a `view_size` canvas and outlines every
/// label's frame, the way the labels sit over the picture on screen.
///
/// Label frames are in view coordinates. Outlines are clipped to the canvas.
pub fn render_annotated(image: &Frame, view_size: Size, labels: &[OverlayLabel]) -> Frame {
    let canvas_w = view_size.width.round().max(1.0) as u32;
    let canvas_h = view_size.height.round().max(1.0) as u32;
    let mut canvas = Frame::filled(canvas_w, canvas_h, BACKGROUND, image.index());

    let fit = Rect::aspect_fit(image.size(), Size::new(canvas_w as f64, canvas_h as f64));
    blit_scaled(&mut canvas, image, &fit);

    for label in labels {
        stroke_rect(&mut canvas, &label.frame, LABEL_BORDER_WIDTH, OUTLINE);
    }
    canvas
}

fn blit_scaled(canvas: &mut Frame, image: &Frame, fit: &Rect) {
    let w = fit.width.round() as u32;
    let h = fit.height.round() as u32;
    if w == 0 || h == 0 {
        return;
    }
    let Some(source) = image.to_rgb_image() else {
        return;
    };
    let scaled = imageops::resize(&source, w, h, FilterType::Triangle);
    let ox = fit.x.round() as i64;
    let oy = fit.y.round() as i64;
    for (x, y, pixel) in scaled.enumerate_pixels() {
        put_clipped(canvas, ox + x as i64, oy + y as i64, pixel.0);
    }
}

/// Outline of `rect` drawn inward, `thickness` pixels wide.
fn stroke_rect(canvas: &mut Frame, rect: &Rect, thickness: u32, rgb: [u8; 3]) {
    let r = rect.standardized();
    let x0 = r.x.round() as i64;
    let y0 = r.y.round() as i64;
    let x1 = (r.x + r.width).round() as i64;
    let y1 = (r.y + r.height).round() as i64;
    let t = thickness as i64;
    for y in y0..y1 {
        for x in x0..x1 {
            let on_edge = x < x0 + t || x >= x1 - t || y < y0 + t || y >= y1 - t;
            if on_edge {
                put_clipped(canvas, x, y, rgb);
            }
        }
    }
}

fn put_clipped(canvas: &mut Frame, x: i64, y: i64, rgb: [u8; 3]) {
    if x >= 0 && y >= 0 && x < canvas.width() as i64 && y < canvas.height() as i64 {
        canvas.put_pixel(x as u32, y as u32, rgb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(x: f64, y: f64, w: f64, h: f64) -> OverlayLabel {
        OverlayLabel {
            frame: Rect::new(x, y, w, h),
            text: "cat: 0.90".to_string(),
        }
    }

    #[test]
    fn test_canvas_takes_view_size() {
        let out = render_annotated(&Frame::filled(40, 20, [10, 20, 30], 0), Size::new(100.0, 100.0), &[]);
        assert_eq!((out.width(), out.height()), (100, 100));
    }

    #[test]
    fn test_image_is_letterboxed() {
        // 2:1 image into a square view → bars above and below
        let out = render_annotated(&Frame::filled(40, 20, [10, 20, 30], 0), Size::new(100.0, 100.0), &[]);
        assert_eq!(out.pixel(50, 5), BACKGROUND);
        assert_eq!(out.pixel(50, 50), [10, 20, 30]);
        assert_eq!(out.pixel(50, 95), BACKGROUND);
    }

    #[test]
    fn test_outline_has_border_width() {
        let out = render_annotated(
            &Frame::filled(10, 10, [0, 0, 0], 0),
            Size::new(50.0, 50.0),
            &[label(10.0, 10.0, 20.0, 20.0)],
        );
        assert_eq!(out.pixel(10, 15), OUTLINE);
        assert_eq!(out.pixel(12, 15), OUTLINE);
        assert_eq!(out.pixel(13, 15), BACKGROUND);
        assert_eq!(out.pixel(20, 20), BACKGROUND);
        assert_eq!(out.pixel(29, 20), OUTLINE);
    }

    #[test]
    fn test_outline_outside_canvas_is_clipped() {
        let out = render_annotated(
            &Frame::filled(10, 10, [0, 0, 0], 0),
            Size::new(20.0, 20.0),
            &[label(-5.0, -5.0, 100.0, 100.0)],
        );
        assert_eq!((out.width(), out.height()), (20, 20));
        assert_eq!(out.pixel(10, 10), BACKGROUND);
    }
}

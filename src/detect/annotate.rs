use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::result::Detection;

const PALETTE: [[u8; 3]; 6] = [
    [255, 0, 0],
    [0, 255, 0],
    [0, 0, 255],
    [255, 255, 0],
    [255, 0, 255],
    [0, 255, 255],
];

/// Draw one hollow rectangle per detection, two pixels thick.
pub fn annotate(image: &mut RgbImage, detections: &[Detection]) {
    let (width, height) = image.dimensions();
    for det in detections {
        let color = Rgb(PALETTE[det.class_id % PALETTE.len()]);
        let x = det.x.max(0.0) as i32;
        let y = det.y.max(0.0) as i32;
        let w = det.w.round().max(1.0) as u32;
        let h = det.h.round().max(1.0) as u32;
        if x as u32 >= width || y as u32 >= height {
            continue;
        }
        draw_hollow_rect_mut(image, Rect::at(x, y).of_size(w, h), color);
        if w > 2 && h > 2 {
            draw_hollow_rect_mut(image, Rect::at(x + 1, y + 1).of_size(w - 2, h - 2), color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotate_draws_box_outline() {
        let mut image = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        let det = Detection {
            class_id: 15,
            confidence: 0.9,
            x: 4.0,
            y: 4.0,
            w: 10.0,
            h: 10.0,
        };
        annotate(&mut image, &[det]);
        let color = PALETTE[15 % PALETTE.len()];
        assert_eq!(image.get_pixel(4, 4).0, color);
        assert_eq!(image.get_pixel(13, 13).0, color);
        assert_eq!(image.get_pixel(9, 9).0, [0, 0, 0]);
    }
}

//! Pixel operations used to composite a merged tile.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage, RgbaImage};
use nalgebra::Point2;

/// Pixel window `(x, y, width, height)` of an image.
pub type Window = (u32, u32, u32, u32);

/// Whether every pixel has full alpha.
pub fn is_fully_opaque(image: &RgbaImage) -> bool {
    image.pixels().all(|p| p[3] == u8::MAX)
}

/// Alpha-blend `images` in order onto a transparent canvas
/// sized after `first`. A lone image is returned as is.
pub fn overlay_all<I>(first: RgbaImage, rest: I) -> RgbaImage
where
    I: IntoIterator<Item = RgbaImage>,
{
    let mut rest = rest.into_iter().peekable();
    if rest.peek().is_none() {
        return first;
    }
    let (width, height) = first.dimensions();
    let mut canvas = RgbaImage::new(width, height);
    imageops::overlay(&mut canvas, &first, 0, 0);
    for image in rest {
        imageops::overlay(&mut canvas, &image, 0, 0);
    }
    canvas
}

/// Convert the `[lower, upper]` corners of a region, given
/// in the UV frame of an image of size `dims`, into the
/// pixel window covering it. The window is clamped to the
/// image and is at least one pixel wide and high.
pub fn uv_window(lower: Point2<f64>, upper: Point2<f64>, dims: (u32, u32)) -> Window {
    let (width, height) = dims;
    let px = |f: f64, size: u32| (f * size as f64).round().max(0.).min(size as f64) as u32;

    let x1 = px(lower.x, width).min(width - 1);
    let x2 = px(upper.x, width).max(x1 + 1);
    // v grows southwards: the upper corner is the top row
    let y1 = px(upper.y, height).min(height - 1);
    let y2 = px(lower.y, height).max(y1 + 1);
    (x1, y1, x2 - x1, y2 - y1)
}

/// Stretch `window` of `source` over the whole of `canvas`,
/// blending with what is already drawn.
pub fn stretch_over(canvas: &mut RgbaImage, source: &RgbaImage, window: Window) {
    let (x, y, w, h) = window;
    let (width, height) = canvas.dimensions();
    let region = imageops::crop_imm(source, x, y, w, h).to_image();
    let scaled = imageops::resize(&region, width, height, FilterType::CatmullRom);
    imageops::overlay(canvas, &scaled, 0, 0);
}

/// Drop the alpha channel by compositing over an opaque
/// `background`.
pub fn flatten(image: &RgbaImage, background: Rgb<u8>) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        let alpha = u32::from(p[3]);
        let mix = |c: u8, bg: u8| {
            ((u32::from(c) * alpha + u32::from(bg) * (255 - alpha) + 127) / 255) as u8
        };
        Rgb([
            mix(p[0], background[0]),
            mix(p[1], background[1]),
            mix(p[2], background[2]),
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn opacity_scan() {
        let mut image = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        assert!(is_fully_opaque(&image));
        image.put_pixel(3, 3, Rgba([1, 2, 3, 254]));
        assert!(!is_fully_opaque(&image));
    }

    #[test]
    fn later_images_win() {
        let red = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let mut blue = RgbaImage::new(2, 2);
        blue.put_pixel(0, 0, Rgba([0, 0, 255, 255]));

        let out = overlay_all(red.clone(), vec![blue]);
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 0, 255, 255]));
        assert_eq!(*out.get_pixel(1, 1), Rgba([255, 0, 0, 255]));

        let alone = overlay_all(red.clone(), vec![]);
        assert_eq!(alone, red);
    }

    #[test]
    fn windows() {
        let win = uv_window(Point2::new(0., 1.), Point2::new(0.25, 0.75), (256, 256));
        assert_eq!(win, (0, 192, 64, 64));

        let win = uv_window(Point2::new(0.5, 0.5), Point2::new(0.5001, 0.4999), (256, 256));
        assert_eq!(win, (128, 128, 1, 1));

        let win = uv_window(Point2::new(-0.1, 1.2), Point2::new(1.3, -0.2), (256, 128));
        assert_eq!(win, (0, 0, 256, 128));
    }

    #[test]
    fn stretch_quarter() {
        let mut source = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
        for y in 4..8 {
            for x in 0..4 {
                source.put_pixel(x, y, Rgba([0, 200, 0, 255]));
            }
        }
        let mut canvas = RgbaImage::new(16, 16);
        stretch_over(&mut canvas, &source, (0, 4, 4, 4));
        for p in canvas.pixels() {
            assert!(p[0] <= 1 && p[2] <= 1 && p[3] >= 254);
            assert!((i32::from(p[1]) - 200).abs() <= 1);
        }
    }

    #[test]
    fn flatten_on_background() {
        let mut image = RgbaImage::from_pixel(2, 1, Rgba([200, 100, 50, 255]));
        image.put_pixel(1, 0, Rgba([200, 100, 50, 0]));
        let flat = flatten(&image, Rgb([10, 20, 30]));
        assert_eq!(*flat.get_pixel(0, 0), Rgb([200, 100, 50]));
        assert_eq!(*flat.get_pixel(1, 0), Rgb([10, 20, 30]));

        let half = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 128]));
        assert_eq!(*flatten(&half, Rgb([0, 0, 0])).get_pixel(0, 0), Rgb([128, 128, 128]));
    }
}

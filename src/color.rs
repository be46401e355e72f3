use crate::bbox::{BBox, Ltwh, PixelRect};
use crate::frame::Frame;
use crate::math::{self, Vec3};

/// HSV on the 8-bit image scale: hue in [0, 180), saturation and value in [0, 255].
pub type Hsv = Vec3;

pub fn black() -> Hsv {
    Vec3::zeros()
}

/// Share of the box width and height kept around its center when sampling
/// jersey color.
const JERSEY_FRACTION: f32 = 0.5;

pub fn rgb_to_hsv(rgb: [u8; 3]) -> Hsv {
    let (r, g, b) = (rgb[0] as f32, rgb[1] as f32, rgb[2] as f32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v > 0.0 { diff * 255.0 / v } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };

    if h < 0.0 {
        h += 360.0;
    }

    Vec3::new((h / 2.0).round() % 180.0, s.round(), v.round())
}

/// Dominant color of the central jersey region of `rect`. Black for empty regions.
pub fn sample_region(frame: &Frame, rect: PixelRect) -> Hsv {
    let jersey = rect.central(JERSEY_FRACTION);
    if jersey.is_empty() {
        return black();
    }

    let region = frame.region(jersey);
    let pixels: Vec<Hsv> = region
        .rows()
        .into_iter()
        .map(|px| rgb_to_hsv([px[0], px[1], px[2]]))
        .collect();

    if pixels.is_empty() {
        return black();
    }

    let clustering = math::kmeans(&pixels, 1, 10, 1.0);
    clustering.centers.first().copied().unwrap_or_else(black)
}

/// Samples the detection box when it lies fully inside the frame.
pub fn dominant_color(frame: &Frame, bbox: &BBox<Ltwh>) -> Option<Hsv> {
    let rect = bbox.pixels_within(frame.cols(), frame.rows())?;
    Some(sample_region(frame, rect))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_colors() {
        assert_eq!(rgb_to_hsv([255, 0, 0]), Vec3::new(0.0, 255.0, 255.0));
        assert_eq!(rgb_to_hsv([0, 255, 0]), Vec3::new(60.0, 255.0, 255.0));
        assert_eq!(rgb_to_hsv([0, 0, 255]), Vec3::new(120.0, 255.0, 255.0));
        assert_eq!(rgb_to_hsv([0, 0, 0]), black());
        assert_eq!(rgb_to_hsv([128, 128, 128]), Vec3::new(0.0, 0.0, 128.0));
    }

    #[test]
    fn samples_only_the_jersey_center() {
        let mut frame = Frame::filled(1, 100, 100, [0, 255, 0]);
        // 40x40 box at (20, 20), jersey center is the 20x20 block at (30, 30)
        frame.fill_rect(
            PixelRect {
                x: 30,
                y: 30,
                width: 20,
                height: 20,
            },
            [255, 0, 0],
        );

        let color = dominant_color(&frame, &BBox::ltwh(20.0, 20.0, 40.0, 40.0)).unwrap();
        assert!((color - Vec3::new(0.0, 255.0, 255.0)).norm() < 1e-3);
    }

    #[test]
    fn outside_frame_is_not_sampled() {
        let frame = Frame::filled(1, 50, 50, [10, 20, 30]);
        assert!(dominant_color(&frame, &BBox::ltwh(40.0, 40.0, 20.0, 20.0)).is_none());
    }

    #[test]
    fn tiny_box_is_black() {
        let frame = Frame::filled(1, 50, 50, [200, 20, 30]);
        let color = dominant_color(&frame, &BBox::ltwh(10.0, 10.0, 1.0, 1.0)).unwrap();
        assert_eq!(color, black());
    }
}

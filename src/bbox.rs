use nalgebra as na;
use std::marker::PhantomData;

pub trait BBoxFormat: std::fmt::Debug + Copy {}

/// Left-top-width-height format, contains left top corner and width-height
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ltwh;
impl BBoxFormat for Ltwh {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox<F: BBoxFormat>([f32; 4], PhantomData<F>);

impl<F: BBoxFormat> From<BBox<F>> for [f32; 4] {
    fn from(bbox: BBox<F>) -> Self {
        bbox.0
    }
}

impl<F: BBoxFormat> BBox<F> {
    #[inline]
    pub fn as_slice(&self) -> &[f32; 4] {
        &self.0
    }
}

/// Integer pixel rectangle, guaranteed to lie inside the frame it was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelRect {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Central region spanning `fraction` of each side, aligned the way an
    /// integer rectangle built from `(w * offset, h * offset, w * fraction, h * fraction)` is.
    pub fn central(&self, fraction: f32) -> PixelRect {
        let offset = (1.0 - fraction) / 2.0;
        let (w, h) = (self.width as f32, self.height as f32);

        let x = (w * offset) as usize;
        let y = (h * offset) as usize;
        let width = ((w * fraction) as usize).min(self.width - x.min(self.width));
        let height = ((h * fraction) as usize).min(self.height - y.min(self.height));

        PixelRect {
            x: self.x + x,
            y: self.y + y,
            width,
            height,
        }
    }
}

impl BBox<Ltwh> {
    #[inline]
    pub fn ltwh(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], Default::default())
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3]
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    #[inline]
    pub fn as_ltrb(&self) -> BBox<Ltrb> {
        self.into()
    }

    /// Middle of the bottom edge, the closest box point to where a player
    /// touches the ground.
    #[inline]
    pub fn bottom_center(&self) -> na::Point2<f32> {
        na::Point2::new(self.left() + self.width() / 2.0, self.top() + self.height())
    }

    /// Same size, shifted so that its bottom-center lands on `pt`.
    #[inline]
    pub fn with_bottom_center(&self, pt: na::Point2<f32>) -> Self {
        Self::ltwh(
            pt.x - self.width() / 2.0,
            pt.y - self.height(),
            self.width(),
            self.height(),
        )
    }

    pub fn iou(&self, other: &BBox<Ltwh>) -> f32 {
        let a = self.as_ltrb();
        let b = other.as_ltrb();

        let i_w = (a.right().min(b.right()) - a.left().max(b.left())).max(0.0);
        let i_h = (a.bottom().min(b.bottom()) - a.top().max(b.top())).max(0.0);
        let i_area = i_w * i_h;
        let u_area = self.area() + other.area() - i_area;

        if u_area > 0.0 {
            i_area / u_area
        } else {
            0.0
        }
    }

    /// Rounds to whole pixels and returns the rectangle only when it lies
    /// completely inside a `cols x rows` image.
    pub fn pixels_within(&self, cols: usize, rows: usize) -> Option<PixelRect> {
        if !self.0.iter().all(|v| v.is_finite()) {
            return None;
        }

        let x = self.left().round() as i64;
        let y = self.top().round() as i64;
        let w = self.width().round() as i64;
        let h = self.height().round() as i64;

        if x < 0 || y < 0 || w < 0 || h < 0 {
            return None;
        }

        if x.checked_add(w)? > cols as i64 || y.checked_add(h)? > rows as i64 {
            return None;
        }

        Some(PixelRect {
            x: x as usize,
            y: y as usize,
            width: w as usize,
            height: h as usize,
        })
    }
}

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], Default::default())
    }

    #[inline]
    pub fn as_ltwh(&self) -> BBox<Ltwh> {
        self.into()
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }
}

impl<'a> From<&'a BBox<Ltwh>> for BBox<Ltrb> {
    #[inline]
    fn from(v: &'a BBox<Ltwh>) -> Self {
        Self(
            [v.0[0], v.0[1], v.0[2] + v.0[0], v.0[3] + v.0[1]],
            Default::default(),
        )
    }
}

impl<'a> From<&'a BBox<Ltrb>> for BBox<Ltwh> {
    #[inline]
    fn from(v: &'a BBox<Ltrb>) -> Self {
        Self(
            [v.0[0], v.0[1], v.0[2] - v.0[0], v.0[3] - v.0[1]],
            Default::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_is_symmetric() {
        let a = BBox::ltwh(10.0, 10.0, 40.0, 80.0);
        let b = BBox::ltwh(25.0, 30.0, 40.0, 80.0);

        assert!(a.iou(&b) > 0.0);
        assert_eq!(a.iou(&b), b.iou(&a));
    }

    #[test]
    fn iou_with_itself_is_one() {
        let a = BBox::ltwh(3.5, 7.25, 12.0, 30.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BBox::ltwh(0.0, 0.0, 10.0, 10.0);
        let b = BBox::ltwh(20.0, 0.0, 10.0, 10.0);
        let touching = BBox::ltwh(10.0, 0.0, 10.0, 10.0);

        assert_eq!(a.iou(&b), 0.0);
        assert_eq!(a.iou(&touching), 0.0);
    }

    #[test]
    fn iou_of_degenerate_box_is_zero() {
        let a = BBox::ltwh(0.0, 0.0, 0.0, 10.0);
        let b = BBox::ltwh(0.0, 0.0, 10.0, 10.0);

        assert_eq!(a.iou(&b), 0.0);
        assert_eq!(a.iou(&a), 0.0);
    }

    #[test]
    fn iou_half_overlap() {
        let a = BBox::ltwh(0.0, 0.0, 10.0, 10.0);
        let b = BBox::ltwh(5.0, 0.0, 10.0, 10.0);

        // 50 / (100 + 100 - 50)
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn bottom_center_round_trip() {
        let a = BBox::ltwh(10.0, 20.0, 30.0, 60.0);
        let pt = a.bottom_center();
        assert_eq!(pt, na::Point2::new(25.0, 80.0));

        let moved = a.with_bottom_center(na::Point2::new(50.0, 100.0));
        assert_eq!(moved.as_slice(), &[35.0, 40.0, 30.0, 60.0]);
    }

    #[test]
    fn pixels_within_rejects_out_of_frame() {
        let inside = BBox::ltwh(0.0, 0.0, 10.0, 10.0);
        let outside = BBox::ltwh(-1.0, 0.0, 10.0, 10.0);
        let overflow = BBox::ltwh(5.0, 5.0, 10.0, 10.0);

        assert!(inside.pixels_within(10, 10).is_some());
        assert!(outside.pixels_within(10, 10).is_none());
        assert!(overflow.pixels_within(10, 10).is_none());
    }

    #[test]
    fn pixels_within_rejects_huge_and_non_finite() {
        assert!(BBox::ltwh(1e30, 0.0, 1e30, 10.0).pixels_within(32, 32).is_none());
        assert!(BBox::ltwh(0.0, 1e30, 10.0, 1e30).pixels_within(32, 32).is_none());
        assert!(BBox::ltwh(f32::NAN, 0.0, 10.0, 10.0).pixels_within(32, 32).is_none());
        assert!(BBox::ltwh(0.0, 0.0, f32::INFINITY, 10.0).pixels_within(32, 32).is_none());
    }

    #[test]
    fn central_region_is_half_size() {
        let rect = PixelRect {
            x: 10,
            y: 20,
            width: 8,
            height: 4,
        };

        assert_eq!(
            rect.central(0.5),
            PixelRect {
                x: 12,
                y: 21,
                width: 4,
                height: 2
            }
        );
    }
}

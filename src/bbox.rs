use std::marker::PhantomData;

pub trait BBoxFormat: std::fmt::Debug {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

/// X-y-width-height format, contains coordinates of the center of bbox and width-height
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Xywh;
impl BBoxFormat for Xywh {}

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

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], PhantomData)
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

    #[inline]
    pub fn area(&self) -> f32 {
        (self.right() - self.left()).max(0.0) * (self.bottom() - self.top()).max(0.0)
    }

    /// Clamps the box into `[0, width) x [0, height)`.
    pub fn clamp(&self, width: f32, height: f32) -> Self {
        let max_x = (width - 1.0).max(0.0);
        let max_y = (height - 1.0).max(0.0);

        Self::ltrb(
            self.left().clamp(0.0, max_x),
            self.top().clamp(0.0, max_y),
            self.right().clamp(0.0, max_x),
            self.bottom().clamp(0.0, max_y),
        )
    }

    pub fn iou(&self, other: &BBox<Ltrb>) -> f32 {
        let i_left = self.left().max(other.left());
        let i_top = self.top().max(other.top());
        let i_right = self.right().min(other.right());
        let i_bottom = self.bottom().min(other.bottom());
        let i_area = (i_right - i_left).max(0.) * (i_bottom - i_top).max(0.);

        let union = self.area() + other.area() - i_area;
        if union <= 0.0 {
            return 0.0;
        }

        i_area / union
    }

    #[inline]
    pub fn as_xywh(&self) -> BBox<Xywh> {
        self.into()
    }
}

impl BBox<Xywh> {
    #[inline]
    pub fn xywh(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], PhantomData)
    }

    #[inline(always)]
    pub fn cx(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn cy(&self) -> f32 {
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
    pub fn as_ltrb(&self) -> BBox<Ltrb> {
        self.into()
    }
}

impl<'a> From<&'a BBox<Xywh>> for BBox<Ltrb> {
    #[inline]
    fn from(v: &'a BBox<Xywh>) -> Self {
        Self(
            [
                v.0[0] - v.0[2] / 2.0,
                v.0[1] - v.0[3] / 2.0,
                v.0[0] + v.0[2] / 2.0,
                v.0[1] + v.0[3] / 2.0,
            ],
            PhantomData,
        )
    }
}

impl<'a> From<&'a BBox<Ltrb>> for BBox<Xywh> {
    #[inline]
    fn from(v: &'a BBox<Ltrb>) -> Self {
        Self(
            [
                v.0[0] + (v.0[2] - v.0[0]) / 2.0,
                v.0[1] + (v.0[3] - v.0[1]) / 2.0,
                v.0[2] - v.0[0],
                v.0[3] - v.0[1],
            ],
            PhantomData,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xywh_to_ltrb() {
        let b = BBox::xywh(50.0, 40.0, 20.0, 10.0).as_ltrb();
        assert_eq!(b.as_slice(), &[40.0, 35.0, 60.0, 45.0]);
        assert_eq!(b.as_xywh().as_slice(), &[50.0, 40.0, 20.0, 10.0]);
    }

    #[test]
    fn iou_of_disjoint_and_identical_boxes() {
        let a = BBox::ltrb(0.0, 0.0, 10.0, 10.0);
        let b = BBox::ltrb(20.0, 20.0, 30.0, 30.0);

        assert_eq!(a.iou(&b), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = BBox::ltrb(0.0, 0.0, 10.0, 10.0);
        let b = BBox::ltrb(5.0, 0.0, 15.0, 10.0);

        // 50 / (100 + 100 - 50)
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn clamp_keeps_box_inside_frame() {
        let b = BBox::ltrb(-5.0, -1.0, 700.0, 100.0).clamp(640.0, 480.0);
        assert_eq!(b.as_slice(), &[0.0, 0.0, 639.0, 100.0]);
    }
}

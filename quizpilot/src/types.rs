use {
    serde::{Deserialize, Serialize},
    std::fmt::{self, Display, Formatter},
};

/// A position on the primary monitor, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

impl Display for ScreenPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A rectangle on the primary monitor, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRegion {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a region from two opposite corners given in any order.
    pub fn from_corners(a: ScreenPoint, b: ScreenPoint) -> Self {
        let left = a.x.min(b.x).max(0);
        let top = a.y.min(b.y).max(0);
        let right = a.x.max(b.x).max(0);
        let bottom = a.y.max(b.y).max(0);
        Self {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        }
    }

    /// A square of side `2 * half_size` centered on `center`, clamped to the
    /// top-left edge of the screen.
    pub fn around(center: ScreenPoint, half_size: u32) -> Self {
        let half = i32::try_from(half_size).unwrap_or(i32::MAX);
        Self {
            x: center.x.saturating_sub(half).max(0) as u32,
            y: center.y.saturating_sub(half).max(0) as u32,
            width: half_size.saturating_mul(2),
            height: half_size.saturating_mul(2),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// A point `inset` pixels inside the bottom-right corner.
    pub fn bottom_right_inset(&self, inset: u32) -> ScreenPoint {
        let x = self.x.saturating_add(self.width).saturating_sub(inset);
        let y = self.y.saturating_add(self.height).saturating_sub(inset);
        ScreenPoint::new(
            i32::try_from(x).unwrap_or(i32::MAX),
            i32::try_from(y).unwrap_or(i32::MAX),
        )
    }
}

impl Display for ScreenRegion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} at ({}, {})",
            self.width, self.height, self.x, self.y
        )
    }
}

#[test]
fn region_around_send_button() {
    let region = ScreenRegion::around(ScreenPoint::new(1700, 950), 30);
    assert_eq!(region, ScreenRegion::new(1670, 920, 60, 60));

    let clamped = ScreenRegion::around(ScreenPoint::new(10, 5), 30);
    assert_eq!(clamped, ScreenRegion::new(0, 0, 60, 60));
}

#[test]
fn region_from_corners_in_any_order() {
    let a = ScreenPoint::new(300, 400);
    let b = ScreenPoint::new(100, 150);
    assert_eq!(
        ScreenRegion::from_corners(a, b),
        ScreenRegion::new(100, 150, 200, 250)
    );
    assert_eq!(ScreenRegion::from_corners(b, a), ScreenRegion::from_corners(a, b));
}

#[test]
fn bottom_right_inset_stays_inside() {
    let region = ScreenRegion::new(1000, 200, 800, 600);
    assert_eq!(region.bottom_right_inset(5), ScreenPoint::new(1795, 795));
}

use image::RgbaImage;

/// Fraction of pixels that are exactly equal (all four channels) in both images.
///
/// Images of different dimensions have a similarity of 0. This is an exact-match
/// ratio, so anti-aliasing noise counts as a difference.
pub fn similarity(a: &RgbaImage, b: &RgbaImage) -> f64 {
    if a.dimensions() != b.dimensions() {
        return 0.0;
    }
    let total = u64::from(a.width()) * u64::from(a.height());
    if total == 0 {
        return 1.0;
    }
    let matching = a.pixels().zip(b.pixels()).filter(|(a, b)| a == b).count();
    matching as f64 / total as f64
}

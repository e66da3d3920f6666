// Color conversion utilities

use lightbar_link::Rgb;

/// Convert HSV to RGB
/// h: hue in degrees (wraps, negative values allowed)
/// s: saturation (0-1)
/// v: value/brightness (0-1)
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb {
    let h = h.rem_euclid(360.0);
    let s = s.clamp(0.0, 1.0);
    let v = v.clamp(0.0, 1.0);
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match (h / 60.0) as i32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Rgb::new(
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    )
}

/// Same as [`hsv_to_rgb`] with the hue given as a fraction of a full turn.
pub fn hue_fraction_to_rgb(hue: f32, s: f32, v: f32) -> Rgb {
    hsv_to_rgb(hue * 360.0, s, v)
}

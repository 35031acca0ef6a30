//! Palette for the playground panels and the map canvas.

use eframe::egui::Color32;

/// Panel text.
pub mod ui {
    use super::Color32;

    /// Muted gray for labels.
    pub const LABEL: Color32 = Color32::from_rgb(110, 110, 115);
    pub const VALUE: Color32 = Color32::from_rgb(165, 165, 170);
    /// Active lifecycle and selected rows.
    pub const ACTIVE: Color32 = Color32::from_rgb(90, 170, 250);
    pub const SUCCESS: Color32 = Color32::from_rgb(95, 195, 110);
}

/// Notice severities in the message log.
pub mod notices {
    use super::Color32;

    pub const INFO: Color32 = Color32::from_rgb(140, 140, 180);
    pub const SUCCESS: Color32 = Color32::from_rgb(100, 200, 100);
    pub const WARNING: Color32 = Color32::from_rgb(255, 180, 50);
    pub const ERROR: Color32 = Color32::from_rgb(255, 80, 80);
    pub const BLOCKING: Color32 = Color32::from_rgb(255, 60, 160);
}

/// Map surface painting.
pub mod canvas {
    use super::Color32;

    pub const BACKGROUND: Color32 = Color32::from_rgb(22, 26, 34);
    /// Background while no surface exists.
    pub const INACTIVE: Color32 = Color32::from_rgb(12, 12, 18);
    pub const SELECTION: Color32 = Color32::from_rgb(255, 220, 80);
    pub const SKETCH: Color32 = Color32::from_rgb(255, 255, 255);
    pub const CHROME: Color32 = Color32::from_rgb(240, 240, 245);
    pub const CHROME_TEXT: Color32 = Color32::from_rgb(40, 40, 50);
    pub const ATTRIBUTION: Color32 = Color32::from_rgb(150, 150, 170);

    pub fn graticule() -> Color32 {
        Color32::from_rgba_unmultiplied(70, 90, 110, 110)
    }

    // from_rgba_unmultiplied is not const
    pub fn range_fill() -> Color32 {
        Color32::from_rgba_unmultiplied(51, 136, 255, 40)
    }

    pub fn range_stroke() -> Color32 {
        Color32::from_rgba_unmultiplied(51, 136, 255, 200)
    }
}

/// Parses `#rgb` or `#rrggbb` CSS colors.
pub fn parse_hex(text: &str) -> Option<Color32> {
    let hex = text.trim().strip_prefix('#')?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut digits = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
            let r = digits.next()??;
            let g = digits.next()??;
            let b = digits.next()??;
            Some(Color32::from_rgb(r, g, b))
        }
        6 => Some(Color32::from_rgb(
            channel(hex.get(0..2)?)?,
            channel(hex.get(2..4)?)?,
            channel(hex.get(4..6)?)?,
        )),
        _ => None,
    }
}

/// CSS color with the given opacity, falling back to `fallback`.
pub fn css_color(text: &str, opacity: f64, fallback: Color32) -> Color32 {
    let base = parse_hex(text).unwrap_or(fallback);
    let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color32::from_rgba_unmultiplied(base.r(), base.g(), base.b(), alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("#3388ff"), Some(Color32::from_rgb(0x33, 0x88, 0xff)));
        assert_eq!(parse_hex("#fff"), Some(Color32::from_rgb(255, 255, 255)));
        assert_eq!(parse_hex("red"), None);
        assert_eq!(parse_hex("#12345"), None);
        assert_eq!(parse_hex("#gg0000"), None);
    }

    #[test]
    fn test_css_color_opacity() {
        let c = css_color("#000000", 1.0, Color32::WHITE);
        assert_eq!(c.a(), 255);
        let fallback = css_color("nope", 1.0, Color32::WHITE);
        assert_eq!(fallback, Color32::WHITE);
    }
}

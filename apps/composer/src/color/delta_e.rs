//! CIE L*a*b* conversion (D65) and the CIEDE2000 color difference.

use serde::{Deserialize, Serialize};

use crate::color::Rgb;

// D65 reference white.
const XN: f64 = 0.95047;
const YN: f64 = 1.0;
const ZN: f64 = 1.08883;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

impl Lab {
    pub const fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }

    pub fn from_rgb(color: Rgb) -> Self {
        let r = linearize(color.r);
        let g = linearize(color.g);
        let b = linearize(color.b);

        let x = 0.4124564 * r + 0.3575761 * g + 0.1804375 * b;
        let y = 0.2126729 * r + 0.7151522 * g + 0.0721750 * b;
        let z = 0.0193339 * r + 0.1191920 * g + 0.9503041 * b;

        let fx = lab_f(x / XN);
        let fy = lab_f(y / YN);
        let fz = lab_f(z / ZN);

        Self {
            l: 116.0 * fy - 16.0,
            a: 500.0 * (fx - fy),
            b: 200.0 * (fy - fz),
        }
    }
}

// IEC 61966-2-1 transfer function (the colorimetric one, not the WCAG variant).
fn linearize(channel: u8) -> f64 {
    let c = channel as f64 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_f(t: f64) -> f64 {
    const DELTA: f64 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

/// CIEDE2000 between two sRGB colors.
pub fn delta_e_2000(a: Rgb, b: Rgb) -> f64 {
    delta_e_2000_lab(Lab::from_rgb(a), Lab::from_rgb(b))
}

/// CIEDE2000 with kL = kC = kH = 1.
pub fn delta_e_2000_lab(lab1: Lab, lab2: Lab) -> f64 {
    let pow7_25 = 25.0_f64.powi(7);

    let c1 = lab1.a.hypot(lab1.b);
    let c2 = lab2.a.hypot(lab2.b);
    let c_bar = (c1 + c2) / 2.0;
    let c_bar7 = c_bar.powi(7);
    let g = 0.5 * (1.0 - (c_bar7 / (c_bar7 + pow7_25)).sqrt());

    let a1p = (1.0 + g) * lab1.a;
    let a2p = (1.0 + g) * lab2.a;
    let c1p = a1p.hypot(lab1.b);
    let c2p = a2p.hypot(lab2.b);
    let h1p = hue_degrees(lab1.b, a1p);
    let h2p = hue_degrees(lab2.b, a2p);

    let delta_lp = lab2.l - lab1.l;
    let delta_cp = c2p - c1p;

    let chroma_product = c1p * c2p;
    let delta_hp = if chroma_product == 0.0 {
        0.0
    } else {
        let diff = h2p - h1p;
        if diff.abs() <= 180.0 {
            diff
        } else if diff > 180.0 {
            diff - 360.0
        } else {
            diff + 360.0
        }
    };
    let delta_big_hp = 2.0 * chroma_product.sqrt() * (delta_hp / 2.0).to_radians().sin();

    let l_bar_p = (lab1.l + lab2.l) / 2.0;
    let c_bar_p = (c1p + c2p) / 2.0;
    let h_bar_p = if chroma_product == 0.0 {
        h1p + h2p
    } else if (h1p - h2p).abs() <= 180.0 {
        (h1p + h2p) / 2.0
    } else if h1p + h2p < 360.0 {
        (h1p + h2p + 360.0) / 2.0
    } else {
        (h1p + h2p - 360.0) / 2.0
    };

    let t = 1.0 - 0.17 * (h_bar_p - 30.0).to_radians().cos()
        + 0.24 * (2.0 * h_bar_p).to_radians().cos()
        + 0.32 * (3.0 * h_bar_p + 6.0).to_radians().cos()
        - 0.20 * (4.0 * h_bar_p - 63.0).to_radians().cos();

    let delta_theta = 30.0 * (-((h_bar_p - 275.0) / 25.0).powi(2)).exp();
    let c_bar_p7 = c_bar_p.powi(7);
    let r_c = 2.0 * (c_bar_p7 / (c_bar_p7 + pow7_25)).sqrt();
    let l_offset = (l_bar_p - 50.0).powi(2);
    let s_l = 1.0 + 0.015 * l_offset / (20.0 + l_offset).sqrt();
    let s_c = 1.0 + 0.045 * c_bar_p;
    let s_h = 1.0 + 0.015 * c_bar_p * t;
    let r_t = -(2.0 * delta_theta).to_radians().sin() * r_c;

    let dl = delta_lp / s_l;
    let dc = delta_cp / s_c;
    let dh = delta_big_hp / s_h;

    (dl * dl + dc * dc + dh * dh + r_t * dc * dh).max(0.0).sqrt()
}

fn hue_degrees(b: f64, a_prime: f64) -> f64 {
    if a_prime == 0.0 && b == 0.0 {
        return 0.0;
    }
    let h = b.atan2(a_prime).to_degrees();
    if h < 0.0 {
        h + 360.0
    } else {
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_e_identity_is_zero() {
        for hex in ["#000000", "#FFFFFF", "#E63946", "#1D3557", "#A8DADC", "#808080"] {
            let c = Rgb::from_hex(hex).unwrap();
            let d = delta_e_2000(c, c);
            assert!(d.abs() < 1e-9, "ΔE({hex},{hex}) = {d}");
        }
    }

    #[test]
    fn test_delta_e_is_symmetric() {
        let pairs = [
            (Rgb::new(255, 0, 0), Rgb::new(0, 0, 255)),
            (Rgb::new(12, 200, 90), Rgb::new(14, 190, 100)),
            (Rgb::new(30, 30, 30), Rgb::new(240, 240, 240)),
            (Rgb::new(200, 120, 0), Rgb::new(90, 0, 160)),
        ];
        for (a, b) in pairs {
            let ab = delta_e_2000(a, b);
            let ba = delta_e_2000(b, a);
            assert!((ab - ba).abs() < 1e-9, "asymmetric: {ab} vs {ba}");
        }
    }

    #[test]
    fn test_delta_e_reference_pair() {
        // Sharma, Wu & Dalal (2005) test data, pair 1.
        let d = delta_e_2000_lab(
            Lab::new(50.0, 2.6772, -79.7751),
            Lab::new(50.0, 0.0, -82.7485),
        );
        assert!((d - 2.0425).abs() < 1e-3, "expected 2.0425, got {d}");
    }

    #[test]
    fn test_delta_e_reference_pair_hue_wrap() {
        // Sharma et al. pair 17: hue angles on either side of 0°.
        let d = delta_e_2000_lab(Lab::new(50.0, 2.5, 0.0), Lab::new(73.0, 25.0, -18.0));
        assert!((d - 27.1492).abs() < 1e-3, "expected 27.1492, got {d}");
    }

    #[test]
    fn test_similar_colors_are_close_distinct_colors_far() {
        let near = delta_e_2000(Rgb::new(200, 30, 40), Rgb::new(202, 32, 40));
        let far = delta_e_2000(Rgb::new(200, 30, 40), Rgb::new(20, 200, 240));
        assert!(near < 2.0, "near pair ΔE {near}");
        assert!(far > 30.0, "far pair ΔE {far}");
    }

    #[test]
    fn test_lab_white_and_black() {
        let white = Lab::from_rgb(Rgb::WHITE);
        assert!((white.l - 100.0).abs() < 0.01);
        assert!(white.a.abs() < 0.01 && white.b.abs() < 0.01);
        let black = Lab::from_rgb(Rgb::BLACK);
        assert!(black.l.abs() < 1e-9);
    }
}

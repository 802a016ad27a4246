//! Deterministic label colors
//!
//! Charts compare the same category across episodes and across runs, so a
//! category's color must never depend on insertion order or on which other
//! categories happen to be present. Two sources:
//!
//! * **Curated palette** for the closed vocabularies (emotions, polarity)
//!   and the `other` residual. Hand-picked for contrast between labels that
//!   always appear together.
//! * **Hash-derived color** for open-vocabulary tags. The label is hashed
//!   with 32-bit FNV-1a, the hash picks a hue on the HSL wheel, and one
//!   hash bit picks between a light and a dark band so neighboring hues
//!   still separate. Same tag, same color, forever.
//!
//! ```text
//! h   = fnv1a(label)
//! hue = h mod 360           saturation = 0.65
//! lightness = 0.62 if bit 16 of h is set, else 0.44
//! ```

use crate::ingest::classify::Vocabulary;

/// Residual/sentinel gray, shared by every vocabulary.
pub const OTHER_COLOR: &str = "#9aa0a6";

const CURATED: &[(&str, &str)] = &[
    ("joy", "#f6c344"),
    ("like", "#ef7fae"),
    ("surprise", "#8e6fd8"),
    ("anger", "#e5484d"),
    ("sadness", "#4f7cd1"),
    ("fear", "#3aa6a6"),
    ("disgust", "#7a9e3b"),
    ("pos", "#3fb950"),
    ("neu", "#8b949e"),
    ("neg", "#f85149"),
    ("other", OTHER_COLOR),
];

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1a over the label's UTF-8 bytes.
pub fn fnv1a_32(label: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in label.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

// Piecewise HSL -> RGB. hue in [0, 360), saturation/lightness in [0, 1].
fn hsl_to_rgb(hue: u32, saturation: f64, lightness: f64) -> (u8, u8, u8) {
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let hp = f64::from(hue) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r1, g1, b1) = match hue / 60 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    let byte = |v: f64| ((v + m) * 255.0).round() as u8;
    (byte(r1), byte(g1), byte(b1))
}

/// Hash-derived `#rrggbb` color for an arbitrary label.
pub fn stable_color(label: &str) -> String {
    let hash = fnv1a_32(label);
    let hue = hash % 360;
    let lightness = if (hash >> 16) & 1 == 1 { 0.62 } else { 0.44 };
    let (r, g, b) = hsl_to_rgb(hue, 0.65, lightness);
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// Curated color for a closed-vocabulary label, if one exists.
pub fn curated_color(label: &str) -> Option<&'static str> {
    CURATED
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, color)| *color)
}

/// The display color for a label within a vocabulary. Closed vocabularies
/// use the curated palette (hash fallback for labels the pipeline invents);
/// open vocabularies hash everything except the `other` residual.
pub fn color_for(label: &str, vocabulary: Vocabulary) -> String {
    match vocabulary {
        Vocabulary::Emotion | Vocabulary::Polarity => curated_color(label)
            .map(str::to_string)
            .unwrap_or_else(|| stable_color(label)),
        Vocabulary::Open => {
            if label == "other" {
                OTHER_COLOR.to_string()
            } else {
                stable_color(label)
            }
        }
    }
}

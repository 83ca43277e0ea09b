/// Label 0 means "unlabeled" and doubles as the eraser.
pub const UNLABELED: u8 = 0;

pub const DEFAULT_NUM_COLORS: u8 = 10;

/// Gradient stops the label colours are sampled from (pink → violet → blue).
const GRADIENT_STOPS: [[f32; 3]; 3] = [[1.0, 0.5, 0.5], [0.6, 0.25, 0.7], [0.05, 0.05, 1.0]];

/// Label colours. Index 0 is "no label" and has no colour; labels `1..=n`
/// map to evenly spaced samples of the gradient.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    colors: Vec<[u8; 3]>,
}

impl Palette {
    pub fn gradient(num_colors: u8) -> Self {
        let n = num_colors as usize;
        let colors = (0..n)
            .map(|i| {
                let t = if n > 1 { i as f32 / (n - 1) as f32 } else { 0.0 };
                sample_gradient(t)
            })
            .collect();
        Self { colors }
    }

    /// Number of labels, not counting "unlabeled".
    pub fn num_colors(&self) -> u8 {
        self.colors.len() as u8
    }

    pub fn contains(&self, label: u8) -> bool {
        label as usize <= self.colors.len()
    }

    /// RGB of `label`, or `None` for unlabeled / out-of-range labels.
    pub fn color(&self, label: u8) -> Option<[u8; 3]> {
        match label {
            UNLABELED => None,
            l => self.colors.get(l as usize - 1).copied(),
        }
    }

    /// Zero-based name of the export bucket for `label`.
    pub fn bucket_name(label: u8) -> Option<String> {
        label.checked_sub(1).map(|b| b.to_string())
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::gradient(DEFAULT_NUM_COLORS)
    }
}

fn sample_gradient(t: f32) -> [u8; 3] {
    let segments = (GRADIENT_STOPS.len() - 1) as f32;
    let pos = t.clamp(0.0, 1.0) * segments;
    let seg = (pos.floor() as usize).min(GRADIENT_STOPS.len() - 2);
    let local = pos - seg as f32;
    let (a, b) = (GRADIENT_STOPS[seg], GRADIENT_STOPS[seg + 1]);
    let mut rgb = [0u8; 3];
    for c in 0..3 {
        let v = a[c] + (b[c] - a[c]) * local;
        rgb[c] = (v * 255.0).round() as u8;
    }
    rgb
}

/// Multiplicative tint: each RGB channel becomes `floor(p * c / 255)`.
/// Alpha is left alone.
pub fn tint(pixel: image::Rgba<u8>, color: [u8; 3]) -> image::Rgba<u8> {
    let [r, g, b, a] = pixel.0;
    let mul = |p: u8, c: u8| ((p as u16 * c as u16) / 255) as u8;
    image::Rgba([mul(r, color[0]), mul(g, color[1]), mul(b, color[2]), a])
}

//! Dense ChESS ("Chess-board Extraction by Subtraction and Summation") response.

use chesscal_core::GrayImageView;

/// Radius of the sampling ring.
pub const RING_RADIUS: usize = 5;

/// 16-sample ring of radius 5, clockwise from straight up (y points down).
///
/// Index `n + 4` is the 90° rotation of index `n` and `n + 8` is its opposite.
pub const RING: [(i32, i32); 16] = [
    (0, -5),
    (2, -5),
    (3, -3),
    (5, -2),
    (5, 0),
    (5, 2),
    (3, 3),
    (2, 5),
    (0, 5),
    (-2, 5),
    (-3, 3),
    (-5, 2),
    (-5, 0),
    (-5, -2),
    (-3, -3),
    (-2, -5),
];

/// Dense response map in row-major layout.
#[derive(Clone, Debug)]
pub struct ResponseMap {
    pub w: usize,
    pub h: usize,
    pub data: Vec<f32>,
}

impl ResponseMap {
    /// Response value at an integer coordinate.
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.w + x]
    }

    pub fn max_value(&self) -> f32 {
        self.data.iter().copied().fold(0.0, f32::max)
    }
}

#[inline]
fn ring_samples(img: &GrayImageView<'_>, x: usize, y: usize) -> [f32; 16] {
    let mut s = [0.0f32; 16];
    for (k, (dx, dy)) in RING.iter().enumerate() {
        let px = (x as i32 + dx) as usize;
        let py = (y as i32 + dy) as usize;
        s[k] = img.get(px, py) as f32;
    }
    s
}

/// ChESS response at one pixel: `SR - DR - 16 * MR`.
///
/// The caller guarantees the ring fits inside the image.
#[inline]
pub fn response_at(img: &GrayImageView<'_>, x: usize, y: usize) -> f32 {
    let s = ring_samples(img, x, y);

    let mut sum_response = 0.0f32;
    for n in 0..4 {
        sum_response += ((s[n] + s[n + 8]) - (s[n + 4] + s[n + 12])).abs();
    }

    let mut diff_response = 0.0f32;
    for n in 0..8 {
        diff_response += (s[n] - s[n + 8]).abs();
    }

    let ring_mean = s.iter().sum::<f32>() / 16.0;
    let local_mean = (img.get(x, y) as f32
        + img.get(x - 1, y) as f32
        + img.get(x + 1, y) as f32
        + img.get(x, y - 1) as f32
        + img.get(x, y + 1) as f32)
        / 5.0;
    let mean_response = (ring_mean - local_mean).abs();

    sum_response - diff_response - 16.0 * mean_response
}

/// Direction of the bright diagonal at `(x, y)`, from the second harmonic of
/// the ring samples. The result lies in `(-π/2, π/2]`.
pub fn orientation_at(img: &GrayImageView<'_>, x: usize, y: usize) -> f32 {
    let s = ring_samples(img, x, y);
    let mut c = 0.0f32;
    let mut sn = 0.0f32;
    for (k, (dx, dy)) in RING.iter().enumerate() {
        let phi = (*dy as f32).atan2(*dx as f32);
        c += s[k] * (2.0 * phi).cos();
        sn += s[k] * (2.0 * phi).sin();
    }
    0.5 * sn.atan2(c)
}

/// Compute the dense response. Pixels closer than the ring radius to the
/// border get zero.
pub fn chess_response(img: &GrayImageView<'_>) -> ResponseMap {
    let (w, h) = (img.width, img.height);
    let mut data = vec![0.0f32; w * h];
    let r = RING_RADIUS;
    if w > 2 * r && h > 2 * r {
        for y in r..h - r {
            let row = &mut data[y * w..(y + 1) * w];
            for (x, out) in row.iter_mut().enumerate().take(w - r).skip(r) {
                *out = response_at(img, x, y);
            }
        }
    }
    ResponseMap { w, h, data }
}

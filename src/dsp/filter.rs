//! Low-shelf biquad — matches WebAudio `BiquadFilterNode` ("lowshelf").

use std::f64::consts::PI;

/// Corner frequency of the bass shelf.
pub const BASS_SHELF_HZ: f64 = 200.0;

/// A stereo low-shelf filter (2nd order, shelf slope S = 1).
///
/// Direct Form II Transposed, one state pair per channel. Coefficients come
/// from the Audio EQ Cookbook, the same formulas WebAudio uses.
#[derive(Debug, Clone)]
pub struct LowShelf {
    pub frequency: f64,
    pub gain_db: f64,

    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    // [channel][z1, z2]
    state: [[f64; 2]; 2],

    sample_rate: f64,
    dirty: bool,
}

impl LowShelf {
    pub fn new(sample_rate: f64, frequency: f64, gain_db: f64) -> Self {
        let mut f = LowShelf {
            frequency,
            gain_db,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            state: [[0.0; 2]; 2],
            sample_rate,
            dirty: true,
        };
        f.update_coefficients();
        f
    }

    /// Recompute coefficients from frequency and gain.
    pub fn update_coefficients(&mut self) {
        let nyquist = self.sample_rate / 2.0;
        let frequency = self.frequency.clamp(0.0, nyquist);
        let a = 10.0_f64.powf(self.gain_db / 40.0);

        if frequency >= nyquist {
            // Whole band is below the corner: a flat gain of A^2.
            self.set_coefficients(a * a, 0.0, 0.0, 1.0, 0.0, 0.0);
            return;
        }
        if frequency <= 0.0 {
            self.set_coefficients(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
            return;
        }

        let w0 = 2.0 * PI * frequency / self.sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / 2.0 * 2.0_f64.sqrt();
        let k = 2.0 * a.sqrt() * alpha;

        let b0 = a * ((a + 1.0) - (a - 1.0) * cos_w0 + k);
        let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0);
        let b2 = a * ((a + 1.0) - (a - 1.0) * cos_w0 - k);
        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + k;
        let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0);
        let a2 = (a + 1.0) + (a - 1.0) * cos_w0 - k;

        self.set_coefficients(b0, b1, b2, a0, a1, a2);
    }

    fn set_coefficients(&mut self, b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) {
        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
        self.dirty = false;
    }

    /// Set shelf gain in dB and mark coefficients dirty.
    pub fn set_gain(&mut self, gain_db: f64) {
        self.gain_db = gain_db;
        self.dirty = true;
    }

    #[inline]
    fn tick(&mut self, channel: usize, input: f64) -> f64 {
        let [z1, z2] = &mut self.state[channel];
        let output = self.b0 * input + *z1;
        *z1 = self.b1 * input - self.a1 * output + *z2;
        *z2 = self.b2 * input - self.a2 * output;
        output
    }

    /// Filter a stereo block in place.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        if self.dirty {
            self.update_coefficients();
        }
        for s in left.iter_mut() {
            *s = self.tick(0, *s as f64) as f32;
        }
        for s in right.iter_mut() {
            *s = self.tick(1, *s as f64) as f32;
        }
    }

    /// Forget the filter history; coefficients are kept.
    pub fn reset(&mut self) {
        self.state = [[0.0; 2]; 2];
    }
}

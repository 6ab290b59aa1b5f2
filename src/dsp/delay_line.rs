//! # Delay Line (Ring Buffer)
//!
//! A delay line stores audio samples and lets you read them back after a
//! specified time delay. Every time-based stage in this plugin is built on
//! it: the voices, the pitch shifter's grain buffer, and the damping
//! engine's tap buffer.
//!
//! ## How the Ring Buffer Works
//!
//! A `Vec<f32>` acts as a circular tape and an index acts as the write
//! head. The write head always points at the *next* slot to record into:
//!
//! 1. [`read(d)`](DelayLine::read) looks `d` samples behind the write head,
//!    wrapping around the start of the buffer. For whole-number `d ≥ 1`
//!    this is exactly the sample written `d` writes ago.
//! 2. [`write(x)`](DelayLine::write) records `x` at the write head and
//!    moves the head forward one slot, wrapping back to 0 at the end.
//!
//! A feedback delay reads first, then writes:
//!
//! ```text
//! let delayed = line.read(delay);
//! line.write(input + feedback * delayed);
//! ```
//!
//! `d = 0` points at the slot about to be overwritten, which holds the
//! sample written `capacity` writes ago. On a ring, 0 and `capacity` are
//! the same distance.
//!
//! ## Interpolation
//!
//! Fractional delays (441.3 samples, or a delay that an LFO sweeps) blend
//! neighbouring samples:
//!
//! ```text
//! linear:  s0 * (1 - f) + s1 * f
//! cubic:   Catmull-Rom through the four samples around the read point
//! ```
//!
//! Linear is cheap and exact at whole-sample delays. Cubic keeps more high
//! end when the read point sweeps, which matters for the modulated voices.

/// Which formula [`DelayLine::read`] uses between stored samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Cubic,
}

/// A ring buffer that functions as an audio delay line.
///
/// The buffer is allocated once, at construction or in
/// [`configure()`](Self::configure). Reads and writes never allocate.
pub struct DelayLine {
    /// The circular buffer storing audio samples. Starts silent.
    buffer: Vec<f32>,

    /// Where the next incoming sample will be stored. Always in
    /// `0..buffer_len`.
    write_pos: usize,

    buffer_len: usize,

    interpolation: Interpolation,
}

impl DelayLine {
    /// Create a delay line holding `capacity` samples (at least 4, so the
    /// cubic neighbourhood always fits).
    pub fn new(capacity: usize, interpolation: Interpolation) -> Self {
        let buffer_len = capacity.max(4);
        Self {
            buffer: vec![0.0; buffer_len],
            write_pos: 0,
            buffer_len,
            interpolation,
        }
    }

    /// Re-size the buffer to `capacity` samples and clear it.
    ///
    /// Allocates, so only call it from `prepare()`, never from the audio
    /// callback.
    pub fn configure(&mut self, capacity: usize) {
        let buffer_len = capacity.max(4);
        self.buffer.clear();
        self.buffer.resize(buffer_len, 0.0);
        self.buffer_len = buffer_len;
        self.write_pos = 0;
    }

    pub fn capacity(&self) -> usize {
        self.buffer_len
    }

    /// Largest delay [`read()`](Self::read) will honour; longer requests
    /// are clamped to this.
    pub fn max_delay(&self) -> f32 {
        (self.buffer_len - 1) as f32
    }

    /// Store a sample at the write head and advance the head.
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos += 1;
        if self.write_pos == self.buffer_len {
            self.write_pos = 0;
        }
    }

    /// Read a (possibly fractional) number of samples behind the write
    /// head.
    ///
    /// Delays outside `[0, capacity - 1]` are clamped, and a NaN delay
    /// reads at 0, so the index math can never leave the buffer.
    pub fn read(&self, delay_samples: f32) -> f32 {
        let delay = if delay_samples.is_nan() {
            0.0
        } else {
            delay_samples.clamp(0.0, self.max_delay())
        };

        let delay_int = delay as usize;
        let frac = delay - delay_int as f32;

        match self.interpolation {
            Interpolation::Linear => {
                let s0 = self.tap(delay_int);
                let s1 = self.tap(delay_int + 1);
                s0 * (1.0 - frac) + s1 * frac
            }
            Interpolation::Cubic => {
                // y0 is the newer neighbour, y3 the older one; the read
                // point sits between y1 and y2.
                let y0 = self.tap(delay_int + self.buffer_len - 1);
                let y1 = self.tap(delay_int);
                let y2 = self.tap(delay_int + 1);
                let y3 = self.tap(delay_int + 2);
                catmull_rom(y0, y1, y2, y3, frac)
            }
        }
    }

    /// Zero the buffer and move the write head back to the start.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    /// Sample stored `offset` slots behind the write head, for any offset.
    #[inline]
    fn tap(&self, offset: usize) -> f32 {
        let offset = offset % self.buffer_len;
        let index = (self.write_pos + self.buffer_len - offset) % self.buffer_len;
        self.buffer[index]
    }
}

/// Four-point Catmull-Rom spline between `y1` (t = 0) and `y2` (t = 1).
#[inline]
pub fn catmull_rom(y0: f32, y1: f32, y2: f32, y3: f32, t: f32) -> f32 {
    y1 + 0.5
        * t
        * (y2 - y0
            + t * (2.0 * y0 - 5.0 * y1 + 4.0 * y2 - y3 + t * (3.0 * (y1 - y2) + y3 - y0)))
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify basic write-then-read at an exact sample position.
    #[test]
    fn test_write_and_read_exact() {
        let mut dl = DelayLine::new(100, Interpolation::Linear);

        dl.write(0.75);

        // Reading 1 sample back should give us the 0.75 we just wrote.
        let result = dl.read(1.0);
        assert!((result - 0.75).abs() < 1e-6, "Expected 0.75, got {result}");
    }

    /// Verify linear interpolation between two samples.
    #[test]
    fn test_interpolation() {
        let mut dl = DelayLine::new(100, Interpolation::Linear);

        dl.write(0.0);
        dl.write(1.0);

        // 1 back is 1.0, 2 back is 0.0, halfway is 0.5.
        let result = dl.read(1.5);
        assert!((result - 0.5).abs() < 1e-6, "Expected 0.5, got {result}");
    }

    /// Verify the buffer wraps correctly past its boundaries.
    #[test]
    fn test_wrapping() {
        let mut dl = DelayLine::new(4, Interpolation::Linear);

        // Six writes into four slots: the buffer holds [4, 5, 2, 3] and
        // the write head sits on slot 2.
        for i in 0..6 {
            dl.write(i as f32);
        }

        assert!((dl.read(1.0) - 5.0).abs() < 1e-6);
        assert!((dl.read(3.0) - 3.0).abs() < 1e-6);
        // Zero back is the slot about to be overwritten: the oldest value.
        assert!((dl.read(0.0) - 2.0).abs() < 1e-6);
    }

    /// For every integer delay, both interpolators return exactly the
    /// value written that many steps earlier, across several wraps.
    #[test]
    fn test_integer_reads_match_history_after_wraps() {
        for interpolation in [Interpolation::Linear, Interpolation::Cubic] {
            let capacity = 37;
            let mut dl = DelayLine::new(capacity, interpolation);
            let mut history = Vec::new();

            for n in 0..(capacity * 3 + 5) {
                let value = ((n * 7919) % 101) as f32 / 101.0 - 0.5;
                dl.write(value);
                history.push(value);
            }

            for d in 1..capacity {
                let expected = history[history.len() - d];
                let got = dl.read(d as f32);
                assert!(
                    (got - expected).abs() < 1e-6,
                    "{interpolation:?}: delay {d} expected {expected}, got {got}"
                );
            }

            let oldest = history[history.len() - capacity];
            assert!((dl.read(0.0) - oldest).abs() < 1e-6);
        }
    }

    /// Small changes in delay give small changes in output.
    #[test]
    fn test_read_is_continuous_in_delay() {
        for interpolation in [Interpolation::Linear, Interpolation::Cubic] {
            let mut dl = DelayLine::new(64, interpolation);
            for n in 0..64 {
                dl.write((n as f32 * 0.37).sin());
            }

            let eps = 1e-4;
            let mut d = 2.0;
            while d < 60.0 {
                let jump = (dl.read(d + eps) - dl.read(d)).abs();
                assert!(
                    jump < 1e-2,
                    "{interpolation:?}: jump {jump} at delay {d}"
                );
                d += 0.173;
            }
        }
    }

    #[test]
    fn test_catmull_rom_endpoints_and_linear_data() {
        assert!((catmull_rom(0.0, 1.0, 2.0, 3.0, 0.0) - 1.0).abs() < 1e-6);
        assert!((catmull_rom(0.0, 1.0, 2.0, 3.0, 1.0) - 2.0).abs() < 1e-6);
        // On a straight line Catmull-Rom is exact.
        assert!((catmull_rom(0.0, 1.0, 2.0, 3.0, 0.25) - 1.25).abs() < 1e-6);
    }

    /// Out-of-range and NaN delays are clamped, never out of bounds.
    #[test]
    fn test_out_of_range_delay_is_clamped() {
        let mut dl = DelayLine::new(8, Interpolation::Cubic);
        for i in 0..8 {
            dl.write(i as f32);
        }
        let at_max = dl.read(dl.max_delay());
        assert_eq!(dl.read(1.0e9), at_max);
        assert_eq!(dl.read(-5.0), dl.read(0.0));
        assert!(dl.read(f32::NAN).is_finite());
    }

    /// Verify that clearing resets everything to silence.
    #[test]
    fn test_clear() {
        let mut dl = DelayLine::new(10, Interpolation::Linear);

        dl.write(0.5);
        dl.clear();

        let result = dl.read(1.0);
        assert!(
            result.abs() < 1e-6,
            "Expected 0.0 after clear, got {result}"
        );
    }

    #[test]
    fn test_configure_resizes_and_clears() {
        let mut dl = DelayLine::new(10, Interpolation::Linear);
        dl.write(1.0);
        dl.configure(50);
        assert_eq!(dl.capacity(), 50);
        assert!(dl.read(1.0).abs() < 1e-6);
        assert!((dl.max_delay() - 49.0).abs() < 1e-6);
    }

    /// Verify that writing multiple samples and reading them back
    /// produces the correct sequence (FIFO behavior).
    #[test]
    fn test_fifo_sequence() {
        let mut dl = DelayLine::new(10, Interpolation::Linear);

        for i in 1..=5 {
            dl.write(i as f32);
        }

        assert!((dl.read(1.0) - 5.0).abs() < 1e-6);
        assert!((dl.read(2.0) - 4.0).abs() < 1e-6);
        assert!((dl.read(3.0) - 3.0).abs() < 1e-6);
        assert!((dl.read(4.0) - 2.0).abs() < 1e-6);
        assert!((dl.read(5.0) - 1.0).abs() < 1e-6);
    }
}

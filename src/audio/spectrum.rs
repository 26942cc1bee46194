//! Spectral band analysis: Hann window, FFT magnitudes, 3 band means

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::ops::Range;
use std::sync::Arc;

/// Band edges in Hz: bass [20, 300), mid [300, 2000), treble [2000, 8000)
pub const BAND_EDGES_HZ: [f64; 4] = [20.0, 300.0, 2000.0, 8000.0];

/// Mean spectral magnitude per band for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandEnergies {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
}

impl BandEnergies {
    pub fn new(bass: f32, mid: f32, treble: f32) -> Self {
        Self { bass, mid, treble }
    }

    pub fn as_array(&self) -> [f32; 3] {
        [self.bass, self.mid, self.treble]
    }
}

/// FFT bin ranges for the three bands at one `(sample_rate, frame_size)`.
///
/// A bin `k` belongs to a band when its centre frequency `k * sample_rate / frame_size`
/// falls inside the band's half-open Hz range. Bin 0 (DC) never belongs to a band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandLayout {
    sample_rate: u32,
    frame_size: usize,
    ranges: [Range<usize>; 3],
}

impl BandLayout {
    pub fn new(sample_rate: u32, frame_size: usize) -> Self {
        let bin_count = frame_size / 2 + 1;

        // First bin whose centre frequency is >= freq
        let freq_to_bin = |freq: f64| -> usize {
            let bin = (freq * frame_size as f64 / sample_rate.max(1) as f64).ceil() as usize;
            bin.min(bin_count)
        };

        let edges = BAND_EDGES_HZ.map(freq_to_bin);
        let range = |lo: usize, hi: usize| {
            let start = lo.max(1);
            start..hi.max(start)
        };

        Self {
            sample_rate,
            frame_size,
            ranges: [
                range(edges[0], edges[1]), // Bass
                range(edges[1], edges[2]), // Mid
                range(edges[2], edges[3]), // Treble
            ],
        }
    }

    pub fn bass(&self) -> Range<usize> {
        self.ranges[0].clone()
    }

    pub fn mid(&self) -> Range<usize> {
        self.ranges[1].clone()
    }

    pub fn treble(&self) -> Range<usize> {
        self.ranges[2].clone()
    }

    pub fn ranges(&self) -> &[Range<usize>; 3] {
        &self.ranges
    }

    /// Width of one FFT bin in Hz
    pub fn bin_width(&self) -> f64 {
        self.sample_rate as f64 / self.frame_size as f64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }
}

/// Stateless per-frame analyzer. The window, FFT plan and band layout are
/// derived once at construction and never change afterwards.
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    layout: BandLayout,
}

impl SpectralAnalyzer {
    pub fn new(sample_rate: u32, frame_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(frame_size);

        // Hann window
        let denom = frame_size.saturating_sub(1).max(1) as f32;
        let window: Vec<f32> = (0..frame_size)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / denom).cos()))
            .collect();

        Self {
            fft,
            window,
            layout: BandLayout::new(sample_rate, frame_size),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.window.len()
    }

    pub fn layout(&self) -> &BandLayout {
        &self.layout
    }

    /// Magnitudes of the `N/2 + 1` non-negative frequency bins of the windowed frame.
    pub fn magnitudes(&self, samples: &[f32]) -> Vec<f32> {
        let n = self.frame_size();
        if samples.len() < n {
            return Vec::new();
        }

        let mut buffer: Vec<Complex<f32>> = samples
            .iter()
            .take(n)
            .zip(self.window.iter())
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();

        self.fft.process(&mut buffer);

        buffer.iter().take(n / 2 + 1).map(|c| c.norm()).collect()
    }

    /// Analyze one frame. Frames shorter than the frame size yield zero energies;
    /// extra trailing samples are ignored.
    pub fn analyze(&self, samples: &[f32]) -> BandEnergies {
        let magnitudes = self.magnitudes(samples);
        if magnitudes.is_empty() {
            return BandEnergies::default();
        }

        let mut bands = [0.0f32; 3];
        for (band, range) in bands.iter_mut().zip(self.layout.ranges()) {
            let end = range.end.min(magnitudes.len());
            let start = range.start.min(end);
            if start < end {
                let sum: f32 = magnitudes[start..end].iter().sum();
                *band = sum / (end - start) as f32;
            }
        }

        BandEnergies::new(bands[0], bands[1], bands[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin()
            })
            .collect()
    }

    #[test]
    fn band_layout_matches_reference_partition() {
        let layout = BandLayout::new(44100, 2048);

        assert_eq!(layout.bass(), 1..14);
        assert_eq!(layout.mid(), 14..93);
        assert_eq!(layout.treble(), 93..372);
        assert_eq!(layout.bass().len(), 13);
        assert_eq!(layout.mid().len(), 79);
        assert_eq!(layout.treble().len(), 279);
    }

    #[test]
    fn band_layout_scales_with_rate_and_size() {
        let full = BandLayout::new(44100, 2048);
        let half = BandLayout::new(22050, 1024);

        assert_eq!(half.bin_width(), full.bin_width());
        assert_eq!(half.ranges(), full.ranges());

        // Different bin width: indices change, Hz coverage does not.
        let other = BandLayout::new(48000, 1024);
        let width = other.bin_width();
        for (range, edges) in other.ranges().iter().zip(BAND_EDGES_HZ.windows(2)) {
            let (lo, hi) = (edges[0], edges[1]);
            assert!(range.start as f64 * width >= lo);
            if range.start > 1 {
                assert!((range.start - 1) as f64 * width < lo);
            }
            assert!(((range.end - 1) as f64) * width < hi);
            assert!(range.end as f64 * width >= hi);
        }
        assert_eq!(other.bass(), 1..7);
        assert_eq!(other.mid(), 7..43);
        assert_eq!(other.treble(), 43..171);
    }

    #[test]
    fn band_layout_clamps_to_nyquist() {
        // 8 kHz is above Nyquist at 11025 Hz
        let layout = BandLayout::new(11025, 512);
        assert_eq!(layout.treble().end, 257);
        assert!(layout.bass().start >= 1);
    }

    #[test]
    fn magnitudes_have_half_plus_one_bins() {
        let analyzer = SpectralAnalyzer::new(44100, 2048);
        let frame = sine(440.0, 44100, 2048, 0.5);

        let magnitudes = analyzer.magnitudes(&frame);
        assert_eq!(magnitudes.len(), 1025);
        assert!(magnitudes.iter().all(|m| *m >= 0.0));
    }

    #[test]
    fn analyze_silence_produces_no_energy() {
        let analyzer = SpectralAnalyzer::new(44100, 2048);
        let energies = analyzer.analyze(&vec![0.0; 2048]);

        assert_eq!(energies, BandEnergies::default());
    }

    #[test]
    fn analyze_returns_default_for_insufficient_samples() {
        let analyzer = SpectralAnalyzer::new(44100, 2048);
        let energies = analyzer.analyze(&vec![0.5; 2047]);

        assert_eq!(energies, BandEnergies::default());
    }

    #[test]
    fn dc_offset_is_excluded_from_bass() {
        let analyzer = SpectralAnalyzer::new(44100, 2048);
        let energies = analyzer.analyze(&vec![1.0; 2048]);

        // A Hann-windowed constant leaks only into bins 0 and 1, so the bass
        // mean stays far below the DC magnitude (~1024).
        assert!(energies.bass < 50.0, "bass = {}", energies.bass);
        assert!(energies.treble < 0.1, "treble = {}", energies.treble);
    }

    #[test]
    fn tones_land_in_their_bands() {
        let analyzer = SpectralAnalyzer::new(44100, 2048);

        let bass = analyzer.analyze(&sine(100.0, 44100, 2048, 0.5));
        assert!(bass.bass > bass.mid && bass.bass > bass.treble);

        let mid = analyzer.analyze(&sine(1000.0, 44100, 2048, 0.5));
        assert!(mid.mid > mid.bass && mid.mid > mid.treble);

        let treble = analyzer.analyze(&sine(4000.0, 44100, 2048, 0.5));
        assert!(treble.treble > treble.bass && treble.treble > treble.mid);
    }

    #[test]
    fn analyze_is_deterministic() {
        let analyzer = SpectralAnalyzer::new(44100, 2048);
        let frame = sine(250.0, 44100, 2048, 0.3);

        assert_eq!(analyzer.analyze(&frame), analyzer.analyze(&frame));
    }
}

// Chunk Processor
// Overlap-add chunk processing with equal-power crossfade for streaming
//
// Copyright (C) 2024 Auralis Team
// License: GPLv3

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::f64::consts::FRAC_PI_2;

/// Chunk processing configuration
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    pub num_channels: usize,
    pub crossfade_samples: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 131072, // ~3 seconds at 44.1kHz
            overlap: 2205,      // 50ms at 44.1kHz
            num_channels: 2,
            crossfade_samples: 2205,
        }
    }
}

/// Equal-power (cos/sin) crossfade curve. Unlike a linear crossfade, the
/// summed power of the two legs stays constant across the transition, so
/// there's no perceived dip or bump in loudness at the join.
pub struct EqualPowerCrossfade {
    fade_out: Vec<f32>,
    fade_in: Vec<f32>,
}

impl EqualPowerCrossfade {
    pub fn new(len: usize) -> Self {
        let mut fade_out = Vec::with_capacity(len);
        let mut fade_in = Vec::with_capacity(len);
        for i in 0..len {
            let t = if len > 1 {
                i as f64 / (len - 1) as f64
            } else {
                0.0
            };
            let angle = t * FRAC_PI_2;
            fade_out.push(angle.cos() as f32);
            fade_in.push(angle.sin() as f32);
        }
        Self { fade_out, fade_in }
    }

    pub fn len(&self) -> usize {
        self.fade_in.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fade_in.is_empty()
    }
}

/// Combine the trailing `overlap_samples` of one chunk with the leading
/// `overlap_samples` of the next via an equal-power crossfade. Both inputs
/// must be the same length; the result is that length.
pub fn crossfade_join(tail: &[f32], head: &[f32]) -> Vec<f32> {
    assert_eq!(tail.len(), head.len(), "crossfade_join: mismatched overlap length");
    let curve = EqualPowerCrossfade::new(tail.len());
    tail.iter()
        .zip(head.iter())
        .zip(curve.fade_out.iter().zip(curve.fade_in.iter()))
        .map(|((&t, &h), (&fo, &fi))| t * fo + h * fi)
        .collect()
}

/// Chunk processor for streaming audio
pub struct ChunkProcessor {
    config: ChunkConfig,
    overlap_buffer: Array2<f64>,
}

impl ChunkProcessor {
    pub fn new(config: ChunkConfig) -> Self {
        let overlap_buffer = Array2::zeros((config.num_channels, config.overlap));
        Self { config, overlap_buffer }
    }

    /// Process audio in chunks with overlap-add and an equal-power crossfade
    /// at each chunk boundary.
    pub fn process_chunks<F>(&mut self, audio: &ArrayView2<f64>, mut process_fn: F) -> Array2<f64>
    where
        F: FnMut(&ArrayView2<f64>) -> Array2<f64>,
    {
        let num_channels = audio.shape()[0];
        let total_samples = audio.shape()[1];
        let chunk_size = self.config.chunk_size;
        let overlap = self.config.overlap;
        let hop_size = chunk_size - overlap;

        let num_chunks = (total_samples + hop_size - 1) / hop_size;
        let mut output = Array2::zeros((num_channels, total_samples));

        for chunk_idx in 0..num_chunks {
            let start = chunk_idx * hop_size;
            let end = (start + chunk_size).min(total_samples);
            let current_chunk_size = end - start;

            let chunk = if current_chunk_size < chunk_size {
                let mut padded = Array2::zeros((num_channels, chunk_size));
                padded
                    .slice_mut(ndarray::s![.., ..current_chunk_size])
                    .assign(&audio.slice(ndarray::s![.., start..end]));
                padded
            } else {
                audio.slice(ndarray::s![.., start..end]).to_owned()
            };

            let mut processed = process_fn(&chunk.view());

            if chunk_idx > 0 && self.config.crossfade_samples > 0 {
                self.apply_crossfade(&mut processed);
            }

            let write_start = start;
            let write_end = end.min(total_samples);
            let write_samples = write_end - write_start;

            output
                .slice_mut(ndarray::s![.., write_start..write_end])
                .assign(&processed.slice(ndarray::s![.., ..write_samples]));

            if current_chunk_size == chunk_size && overlap > 0 {
                self.overlap_buffer
                    .assign(&processed.slice(ndarray::s![.., (chunk_size - overlap)..]));
            }
        }

        output
    }

    /// Equal-power crossfade between the stored overlap tail of the
    /// previous chunk and the leading edge of this one.
    fn apply_crossfade(&self, chunk: &mut Array2<f64>) {
        let crossfade_len = self
            .config
            .crossfade_samples
            .min(chunk.shape()[1])
            .min(self.overlap_buffer.shape()[1]);
        if crossfade_len == 0 {
            return;
        }

        for ch in 0..chunk.shape()[0] {
            let tail: Vec<f32> = (0..crossfade_len)
                .map(|i| self.overlap_buffer[[ch, i]] as f32)
                .collect();
            let head: Vec<f32> = (0..crossfade_len).map(|i| chunk[[ch, i]] as f32).collect();
            let joined = crossfade_join(&tail, &head);
            for (i, &sample) in joined.iter().enumerate() {
                chunk[[ch, i]] = sample as f64;
            }
        }
    }

    pub fn reset(&mut self) {
        self.overlap_buffer.fill(0.0);
    }
}

/// Process mono audio in chunks (no crossfade; used for quick one-off scans).
pub fn process_mono_chunks<F>(
    audio: &ArrayView1<f64>,
    chunk_size: usize,
    overlap: usize,
    mut process_fn: F,
) -> Array1<f64>
where
    F: FnMut(&ArrayView1<f64>) -> Array1<f64>,
{
    let total_samples = audio.len();
    let hop_size = chunk_size - overlap;
    let num_chunks = (total_samples + hop_size - 1) / hop_size;

    let mut output = Array1::zeros(total_samples);

    for chunk_idx in 0..num_chunks {
        let start = chunk_idx * hop_size;
        let end = (start + chunk_size).min(total_samples);

        let chunk = audio.slice(ndarray::s![start..end]);
        let processed = process_fn(&chunk);

        let write_len = processed.len().min(total_samples - start);
        output
            .slice_mut(ndarray::s![start..(start + write_len)])
            .assign(&processed.slice(ndarray::s![..write_len]));
    }

    output
}

/// Chunk statistics for orchestrator logging (not part of the public contract).
#[derive(Debug, Clone)]
pub struct ChunkStats {
    pub peak: f64,
    pub rms: f64,
    pub crest_db: f64,
}

impl ChunkStats {
    pub fn compute(chunk: &ArrayView2<f64>) -> Self {
        let peak = chunk.iter().map(|&x| x.abs()).fold(0.0_f64, f64::max);
        let rms = (chunk.iter().map(|&x| x * x).sum::<f64>() / chunk.len() as f64).sqrt();
        let crest_db = if rms > 0.0 { 20.0 * (peak / rms).log10() } else { 0.0 };
        Self { peak, rms, crest_db }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_chunk_processing_preserves_shape() {
        let config = ChunkConfig {
            chunk_size: 1000,
            overlap: 100,
            num_channels: 2,
            crossfade_samples: 50,
        };
        let mut processor = ChunkProcessor::new(config);
        let audio = Array2::ones((2, 3000));
        let output = processor.process_chunks(&audio.view(), |chunk| chunk.to_owned());
        assert_eq!(output.shape(), audio.shape());
    }

    #[test]
    fn test_mono_chunk_processing() {
        let audio = Array1::ones(5000);
        let output = process_mono_chunks(&audio.view(), 1000, 100, |chunk| chunk.mapv(|x| x * 2.0));
        assert!((output[100] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_chunk_stats() {
        let mut chunk = Array2::zeros((2, 1000));
        chunk[[0, 0]] = 1.0;
        chunk[[1, 500]] = 0.5;
        let stats = ChunkStats::compute(&chunk.view());
        assert_eq!(stats.peak, 1.0);
        assert!(stats.rms > 0.0);
        assert!(stats.crest_db > 0.0);
    }

    #[test]
    fn equal_power_crossfade_has_constant_total_power() {
        let tail = vec![1.0f32; 100];
        let head = vec![1.0f32; 100];
        let joined = crossfade_join(&tail, &head);
        assert_eq!(joined.len(), 100);
        assert!(joined.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn equal_power_crossfade_endpoints_favor_each_side() {
        let tail = vec![1.0f32; 64];
        let head = vec![0.0f32; 64];
        let joined = crossfade_join(&tail, &head);
        assert!((joined[0] - 1.0).abs() < 1e-3);
        assert!(joined[63].abs() < 1e-3);
    }

    #[test]
    #[should_panic]
    fn crossfade_join_requires_matching_lengths() {
        let tail = vec![0.0f32; 10];
        let head = vec![0.0f32; 5];
        let _ = crossfade_join(&tail, &head);
    }
}

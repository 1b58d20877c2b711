//! Tempo shifting: duration changes that keep pitch.
//!
//! The tempo primitive (native or `atempo`) only accepts factors inside
//! `[TEMPO_MIN, TEMPO_MAX]`. Larger or smaller factors are decomposed into a
//! chain of in-range steps whose product is the requested factor.

use crate::defaults::{TEMPO_MAX, TEMPO_MIN};
use crate::error::{DubError, Result};
use std::time::Duration;

/// Analysis frame length of the native time stretcher.
const FRAME: Duration = Duration::from_millis(40);

/// Whether a single tempo step can apply `factor`.
pub fn in_primitive_range(factor: f64) -> bool {
    factor.is_finite() && (TEMPO_MIN..=TEMPO_MAX).contains(&factor)
}

/// Reject factors the single-step primitive cannot apply.
pub fn check_step(factor: f64) -> Result<()> {
    if in_primitive_range(factor) {
        Ok(())
    } else {
        Err(DubError::TempoOutOfRange { factor })
    }
}

/// Split `factor` into tempo steps each inside the primitive range.
///
/// The range bounds are powers of two, so dividing by them is exact and the
/// product of the returned steps equals `factor` bit for bit. For example
/// `3.6` becomes `[2.0, 1.8]`.
pub fn tempo_chain(factor: f64) -> Result<Vec<f64>> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(DubError::TempoOutOfRange { factor });
    }

    let mut steps = Vec::new();
    let mut remaining = factor;
    while remaining > TEMPO_MAX {
        steps.push(TEMPO_MAX);
        remaining /= TEMPO_MAX;
    }
    while remaining < TEMPO_MIN {
        steps.push(TEMPO_MIN);
        remaining /= TEMPO_MIN;
    }
    steps.push(remaining);
    Ok(steps)
}

/// Speed interleaved audio up (`factor > 1`) or down without changing pitch.
///
/// Waveform-similarity overlap-add: Hann-windowed frames are taken from the
/// input at `factor` times the output hop, each nudged within a small
/// tolerance to line up with the previous frame's natural continuation.
/// The output has `round(frames / factor)` frames per channel.
pub fn time_stretch(
    samples: &[i16],
    channels: u16,
    sample_rate: u32,
    factor: f64,
) -> Result<Vec<i16>> {
    check_step(factor)?;

    let channels = channels.max(1) as usize;
    let frames = samples.len() / channels;
    let out_frames = (frames as f64 / factor).round() as usize;
    if frames == 0 || out_frames == 0 {
        return Ok(Vec::new());
    }
    if factor == 1.0 {
        return Ok(samples[..frames * channels].to_vec());
    }

    let planes = deinterleave(samples, channels, frames);
    let guide = mix(&planes, frames);

    let frame_len = ((FRAME.as_secs_f64() * sample_rate as f64) as usize / 2 * 2).max(4);
    let hop = frame_len / 2;
    let tolerance = frame_len / 4;
    let window = hann(frame_len);

    let sources = frame_sources(&guide, out_frames, hop, tolerance, factor);

    let mut output = vec![0i16; out_frames * channels];
    for (ch, plane) in planes.iter().enumerate() {
        let mut acc = vec![0f32; out_frames];
        let mut norm = vec![0f32; out_frames];
        for (k, &src) in sources.iter().enumerate() {
            let dst = k * hop;
            for (j, &w) in window.iter().enumerate() {
                let (o, i) = (dst + j, src + j);
                if o >= out_frames || i >= frames {
                    break;
                }
                acc[o] += plane[i] * w;
                norm[o] += w;
            }
        }
        for o in 0..out_frames {
            let value = if norm[o] > 1e-3 {
                acc[o] / norm[o]
            } else {
                // Window edge with no coverage: fall back to the nominal sample.
                let i = ((o as f64 * factor) as usize).min(frames - 1);
                plane[i]
            };
            output[o * channels + ch] = value.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        }
    }
    Ok(output)
}

fn deinterleave(samples: &[i16], channels: usize, frames: usize) -> Vec<Vec<f32>> {
    (0..channels)
        .map(|ch| {
            (0..frames)
                .map(|f| samples[f * channels + ch] as f32)
                .collect()
        })
        .collect()
}

fn mix(planes: &[Vec<f32>], frames: usize) -> Vec<f32> {
    if planes.len() == 1 {
        return planes[0].clone();
    }
    let scale = 1.0 / planes.len() as f32;
    (0..frames)
        .map(|f| planes.iter().map(|p| p[f]).sum::<f32>() * scale)
        .collect()
}

fn hann(len: usize) -> Vec<f32> {
    (0..len)
        .map(|j| {
            let phase = 2.0 * std::f32::consts::PI * j as f32 / len as f32;
            0.5 - 0.5 * phase.cos()
        })
        .collect()
}

/// Input start offset of every output frame.
fn frame_sources(
    guide: &[f32],
    out_frames: usize,
    hop: usize,
    tolerance: usize,
    factor: f64,
) -> Vec<usize> {
    let last = guide.len().saturating_sub(1);
    let mut sources = Vec::with_capacity(out_frames / hop + 1);
    let mut previous: Option<usize> = None;

    let mut k = 0;
    while k * hop < out_frames {
        let nominal = ((k * hop) as f64 * factor).round() as usize;
        let src = match previous {
            None => 0,
            Some(prev) => {
                let natural = prev + hop;
                let lo = nominal.saturating_sub(tolerance);
                let hi = (nominal + tolerance).min(last);
                best_alignment(guide, natural, lo, hi, hop).unwrap_or(nominal.min(last))
            }
        };
        sources.push(src);
        previous = Some(src);
        k += 1;
    }
    sources
}

fn best_alignment(guide: &[f32], natural: usize, lo: usize, hi: usize, span: usize) -> Option<usize> {
    if lo > hi || natural >= guide.len() {
        return None;
    }
    let reference = &guide[natural..(natural + span).min(guide.len())];
    let mut best: Option<(usize, f32)> = None;
    for candidate in lo..=hi {
        let score: f32 = reference
            .iter()
            .zip(&guide[candidate..])
            .map(|(a, b)| a * b)
            .sum();
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }
    best.map(|(candidate, _)| candidate)
}

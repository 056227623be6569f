// Sample decoding for backends that render audio themselves
// Everything is downmixed to mono f32 at the device sample rate.

use claxon::FlacReader;
use hound::WavReader;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("WAV decoding failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("FLAC decoding failed: {0}")]
    Flac(#[from] claxon::Error),

    #[error("Resampler setup failed: {0}")]
    ResamplerSetup(#[from] rubato::ResamplerConstructionError),

    #[error("Resampling failed: {0}")]
    Resample(#[from] rubato::ResampleError),

    #[error("Sample '{0}' contains no audio")]
    Empty(String),
}

/// Decoded mono sample, ready for playback
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub name: String,
    pub data: Vec<f32>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Decode a WAV or FLAC file and convert it to `target_rate`
pub fn load_sample(path: &Path, target_rate: u32) -> Result<SampleBuffer, LoaderError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    let (interleaved, channels, source_rate) = match extension.as_str() {
        "wav" => read_wav(path)?,
        "flac" => read_flac(path)?,
        _ => return Err(LoaderError::UnsupportedFormat(extension)),
    };

    let name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    let mono = downmix(&interleaved, channels);
    if mono.is_empty() {
        return Err(LoaderError::Empty(name));
    }

    Ok(SampleBuffer {
        name,
        data: resample(&mono, source_rate, target_rate)?,
        sample_rate: target_rate,
    })
}

fn read_wav(path: &Path) -> Result<(Vec<f32>, usize, u32), LoaderError> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|x| x as f32 / max))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok((samples, spec.channels.max(1) as usize, spec.sample_rate))
}

fn read_flac(path: &Path) -> Result<(Vec<f32>, usize, u32), LoaderError> {
    let mut reader = FlacReader::open(path)?;
    let info = reader.streaminfo();
    let max = (1i64 << (info.bits_per_sample - 1)) as f32;

    let samples = reader
        .samples()
        .map(|s| s.map(|x| x as f32 / max))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((samples, info.channels.max(1) as usize, info.sample_rate))
}

/// Average interleaved channels into one
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

const SINC_LEN: usize = 256;

/// Band-limited conversion from `source_rate` to `target_rate`
///
/// The whole sample goes through one `SincFixedIn` chunk, then the filter tail
/// is flushed and the output delay trimmed so hits stay on the beat.
pub fn resample(data: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>, LoaderError> {
    if source_rate == target_rate || source_rate == 0 || data.is_empty() {
        return Ok(data.to_vec());
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let expected = (data.len() as f64 * ratio).ceil() as usize;

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    // Short samples are padded to one filter length
    let chunk = data.len().max(SINC_LEN);
    let mut input = data.to_vec();
    input.resize(chunk, 0.0);

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk, 1)?;
    // Half the filter length, in output frames
    let delay = (SINC_LEN as f64 * ratio / 2.0) as usize;

    let waves_in = vec![input];
    let mut output = resampler
        .process(&waves_in, None)?
        .into_iter()
        .next()
        .unwrap_or_default();
    let tail = resampler.process_partial::<Vec<f32>>(None, None)?;
    output.extend(tail.into_iter().flatten());

    Ok(output.into_iter().skip(delay).take(expected).collect())
}

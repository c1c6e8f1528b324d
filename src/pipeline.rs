//! Conversion pipeline — decode → build chain → render → widen → normalize → encode.
//!
//! Every stage consumes the previous stage's complete output. Any error
//! aborts the conversion and no output is produced.

use crate::decode::{extension_hint, AudioDecoder};
use crate::dsp::buffer::SampleBuffer;
use crate::dsp::convolver::{ConvolutionBackend, FftConvolver};
use crate::dsp::impulse;
use crate::dsp::mixer::MixGraph;
use crate::dsp::normalize::normalize;
use crate::dsp::wav;
use crate::dsp::widener::widen;
use crate::error::ReverbError;
use crate::params::EffectParameters;
use crate::progress::{Monotonic, ProgressSink, Stage};

/// Largest input file hosts should accept.
pub const MAX_INPUT_BYTES: u64 = 200 * 1024 * 1024;

/// Suffix that replaces the input file's extension.
pub const OUTPUT_SUFFIX: &str = "_reverb.wav";

/// A finished conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedFile {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

/// `song.mp3` → `song_reverb.wav`. Names without an extension keep their
/// full stem.
pub fn output_file_name(file_name: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() && !ext.contains(['/', '\\']) => stem,
        _ => file_name,
    };
    format!("{stem}{OUTPUT_SUFFIX}")
}

/// Host-side upload guard: audio MIME type and size ceiling.
pub fn check_input(len: u64, mime: &str) -> Result<(), ReverbError> {
    if !mime.starts_with("audio/") {
        return Err(ReverbError::Input("Please select an audio file.".into()));
    }
    if len > MAX_INPUT_BYTES {
        return Err(ReverbError::Input("Please use a file under 200 MB.".into()));
    }
    Ok(())
}

/// An immutable, reusable hall reverb renderer.
pub struct ReverbPipeline {
    params: EffectParameters,
    backend: Box<dyn ConvolutionBackend>,
}

impl Default for ReverbPipeline {
    fn default() -> Self {
        Self {
            params: EffectParameters::hall(),
            backend: Box::new(FftConvolver),
        }
    }
}

impl ReverbPipeline {
    /// Validate `params` and build a pipeline using FFT convolution.
    pub fn new(params: EffectParameters) -> Result<Self, ReverbError> {
        params.validate()?;
        Ok(Self {
            params,
            backend: Box::new(FftConvolver),
        })
    }

    /// Swap the convolution backend.
    pub fn with_backend(mut self, backend: Box<dyn ConvolutionBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn params(&self) -> &EffectParameters {
        &self.params
    }

    /// Run decoded PCM through the effect chain. The result is the
    /// normalized stereo render, ready to encode.
    pub fn process(
        &self,
        source: SampleBuffer,
        progress: &mut dyn ProgressSink,
    ) -> Result<SampleBuffer, ReverbError> {
        let mut progress = Monotonic::new(progress);
        self.process_inner(source, &mut progress)
    }

    /// [`process`](Self::process) followed by WAV encoding.
    pub fn render_wav(
        &self,
        source: SampleBuffer,
        progress: &mut dyn ProgressSink,
    ) -> Result<Vec<u8>, ReverbError> {
        let mut progress = Monotonic::new(progress);
        let rendered = self.process_inner(source, &mut progress)?;
        self.encode_inner(&rendered, &mut progress)
    }

    /// Full conversion of an encoded file.
    pub fn convert(
        &self,
        decoder: &dyn AudioDecoder,
        bytes: &[u8],
        file_name: &str,
        progress: &mut dyn ProgressSink,
    ) -> Result<ConvertedFile, ReverbError> {
        let mut progress = Monotonic::new(progress);
        progress.stage(Stage::Reading);

        progress.stage(Stage::Decoding);
        let hint = extension_hint(file_name);
        let source = decoder.decode(bytes, hint.as_deref())?;
        tracing::debug!(
            file_name,
            input_bytes = bytes.len(),
            channels = source.channel_count(),
            sample_rate = source.sample_rate(),
            frames = source.frames(),
            "decoded source"
        );

        let rendered = self.process_inner(source, &mut progress)?;
        let bytes = self.encode_inner(&rendered, &mut progress)?;
        let file_name = output_file_name(file_name);
        tracing::info!(%file_name, bytes = bytes.len(), "conversion finished");
        Ok(ConvertedFile { bytes, file_name })
    }

    fn process_inner(
        &self,
        source: SampleBuffer,
        progress: &mut Monotonic<'_>,
    ) -> Result<SampleBuffer, ReverbError> {
        let p = &self.params;
        progress.stage(Stage::BuildingChain);
        let ir = impulse::synthesize(source.sample_rate(), p.decay_seconds, p.predelay_ms, p.seed)?;

        progress.stage(Stage::Rendering);
        let mut rendered = MixGraph::new(p, self.backend.as_ref()).render(source, &ir, progress)?;
        drop(ir);

        progress.stage(Stage::Widening);
        widen(&mut rendered, p.widen_factor);

        progress.stage(Stage::Normalizing);
        let gain = normalize(&mut rendered, p.target_peak_db);
        tracing::debug!(?gain, target_db = p.target_peak_db, "normalized output");

        Ok(rendered)
    }

    fn encode_inner(
        &self,
        rendered: &SampleBuffer,
        progress: &mut Monotonic<'_>,
    ) -> Result<Vec<u8>, ReverbError> {
        progress.stage(Stage::Encoding);
        let bytes = wav::encode(rendered)?;
        progress.stage(Stage::Done);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::progress::NoProgress;
    use std::io::Cursor;

    /// Hands back a fixed buffer regardless of input.
    struct FixedDecoder(SampleBuffer);

    impl AudioDecoder for FixedDecoder {
        fn decode(&self, _bytes: &[u8], _hint: Option<&str>) -> Result<SampleBuffer, DecodeError> {
            Ok(self.0.clone())
        }
    }

    struct FailingDecoder;

    impl AudioDecoder for FailingDecoder {
        fn decode(&self, _bytes: &[u8], hint: Option<&str>) -> Result<SampleBuffer, DecodeError> {
            Err(DecodeError::Unsupported(hint.map(str::to_owned)))
        }
    }

    #[test]
    fn output_names() {
        assert_eq!(output_file_name("song.mp3"), "song_reverb.wav");
        assert_eq!(output_file_name("my.song.flac"), "my.song_reverb.wav");
        assert_eq!(output_file_name("noext"), "noext_reverb.wav");
        assert_eq!(output_file_name("dir.v2/track"), "dir.v2/track_reverb.wav");
    }

    #[test]
    fn input_guard() {
        assert!(check_input(1024, "audio/mpeg").is_ok());
        assert!(matches!(check_input(1024, "video/mp4"), Err(ReverbError::Input(_))));
        assert!(matches!(
            check_input(MAX_INPUT_BYTES + 1, "audio/wav"),
            Err(ReverbError::Input(_))
        ));
    }

    #[test]
    fn rejects_invalid_params() {
        let params = EffectParameters {
            decay_seconds: -1.0,
            ..EffectParameters::hall()
        };
        assert!(matches!(ReverbPipeline::new(params), Err(ReverbError::Config(_))));

        for params in [
            EffectParameters {
                decay_seconds: 1e300,
                ..EffectParameters::hall()
            },
            EffectParameters {
                tail_seconds: 1e300,
                ..EffectParameters::hall()
            },
        ] {
            assert!(matches!(ReverbPipeline::new(params), Err(ReverbError::Config(_))));
        }
    }

    #[test]
    fn full_pipeline_mono_constant() {
        // 1 s of 0.5 at 44.1 kHz, mono.
        let source = SampleBuffer::mono(vec![0.5; 44100], 44100).unwrap();
        let pipeline = ReverbPipeline::new(EffectParameters::hall().with_seed(2024)).unwrap();

        let mut reports: Vec<(f32, Stage)> = Vec::new();
        let wav = pipeline
            .render_wav(source, &mut |p: f32, s: Stage| reports.push((p, s)))
            .unwrap();

        let total_frames = 220_500u32; // ceil((1 + 4) * 44100)
        let reader = hound::WavReader::new(Cursor::new(wav.clone())).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.bits_per_sample, 16);
        let data_size = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(data_size, total_frames * 4);
        assert_eq!(reader.duration(), total_frames);

        let peak = reader
            .into_samples::<i16>()
            .map(|s| {
                let q = s.unwrap();
                if q < 0 { q as f32 / 32768.0 } else { q as f32 / 32767.0 }
            })
            .fold(0.0f32, |p, s| p.max(s.abs()));
        let target = 10f32.powf(-0.5 / 20.0);
        assert!((peak - target).abs() / target < 0.001, "peak {peak}, target {target}");

        // Progress is monotonic and ends at 100.
        assert!(reports.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(reports.first().map(|r| r.1), Some(Stage::BuildingChain));
        assert_eq!(reports.last(), Some(&(100.0, Stage::Done)));
        for stage in [Stage::Rendering, Stage::Widening, Stage::Normalizing, Stage::Encoding] {
            assert!(reports.iter().any(|r| r.1 == stage), "missing {stage:?}");
        }
    }

    #[test]
    fn convert_reports_every_stage_and_names_output() {
        let source = SampleBuffer::new(vec![vec![0.2; 800], vec![-0.1; 800]], 8000).unwrap();
        let params = EffectParameters {
            decay_seconds: 0.3,
            tail_seconds: 0.5,
            ..EffectParameters::hall().with_seed(9)
        };
        let pipeline = ReverbPipeline::new(params).unwrap();

        let mut stages = Vec::new();
        let out = pipeline
            .convert(&FixedDecoder(source), b"ignored", "take 1.flac", &mut |_p: f32, s: Stage| {
                if stages.last() != Some(&s) {
                    stages.push(s);
                }
            })
            .unwrap();

        assert_eq!(out.file_name, "take 1_reverb.wav");
        assert_eq!(out.bytes.len(), 44 + (800 + 4000) * 4);
        assert_eq!(
            stages,
            vec![
                Stage::Reading,
                Stage::Decoding,
                Stage::BuildingChain,
                Stage::Rendering,
                Stage::Widening,
                Stage::Normalizing,
                Stage::Encoding,
                Stage::Done,
            ]
        );
    }

    #[test]
    fn decode_failure_aborts_without_output() {
        let pipeline = ReverbPipeline::default();
        let mut last = 0.0;
        let err = pipeline
            .convert(&FailingDecoder, b"xx", "clip.ogg", &mut |p: f32, _s: Stage| last = p)
            .unwrap_err();
        assert!(matches!(err, ReverbError::Decode(DecodeError::Unsupported(Some(ref h))) if h == "ogg"));
        assert_eq!(last, Stage::Decoding.percent());
    }

    #[test]
    fn silent_source_stays_silent() {
        let source = SampleBuffer::silent(2, 400, 8000).unwrap();
        let params = EffectParameters {
            decay_seconds: 0.2,
            tail_seconds: 0.1,
            ..EffectParameters::hall()
        };
        let out = ReverbPipeline::new(params)
            .unwrap()
            .process(source, &mut NoProgress)
            .unwrap();
        assert_eq!(out.frames(), 1200);
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn direct_backend_agrees_with_fft() {
        let source: Vec<f32> = (0..600).map(|i| ((i as f32) * 0.05).sin() * 0.4).collect();
        let params = EffectParameters {
            decay_seconds: 0.05,
            tail_seconds: 0.05,
            ..EffectParameters::hall().with_seed(77)
        };
        let run = |backend: Box<dyn ConvolutionBackend>| {
            ReverbPipeline::new(params.clone())
                .unwrap()
                .with_backend(backend)
                .process(SampleBuffer::mono(source.clone(), 8000).unwrap(), &mut NoProgress)
                .unwrap()
        };
        let fft = run(Box::new(FftConvolver));
        let direct = run(Box::new(crate::dsp::convolver::DirectConvolver));
        for ch in 0..2 {
            for (a, b) in fft.channel(ch).iter().zip(direct.channel(ch)) {
                assert!((a - b).abs() < 1e-3);
            }
        }
    }
}

pub mod decode;
pub mod dsp;
pub mod error;
pub mod params;
pub mod pipeline;
pub mod progress;

pub use crate::dsp::buffer::SampleBuffer;
pub use crate::error::ReverbError;
pub use crate::params::EffectParameters;
pub use crate::pipeline::{ConvertedFile, ReverbPipeline};

use crate::progress::{ProgressSink, Stage};
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the hallverb-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

#[wasm_bindgen]
extern "C" {
    /// Any JS object with a `report(percent, label)` method.
    pub type ProgressReporter;

    #[wasm_bindgen(method)]
    fn report(this: &ProgressReporter, percent: f32, label: &str);
}

struct JsProgress<'a>(Option<&'a ProgressReporter>);

impl ProgressSink for JsProgress<'_> {
    fn report(&mut self, percent: f32, stage: Stage) {
        if let Some(reporter) = self.0 {
            reporter.report(percent, stage.label());
        }
    }
}

/// A finished conversion handed back to JS.
#[wasm_bindgen]
pub struct ReverbOutput {
    bytes: Vec<u8>,
    file_name: String,
}

#[wasm_bindgen]
impl ReverbOutput {
    /// The encoded WAV file.
    #[wasm_bindgen(getter)]
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    #[wasm_bindgen(getter, js_name = fileName)]
    pub fn file_name(&self) -> String {
        self.file_name.clone()
    }
}

impl From<ConvertedFile> for ReverbOutput {
    fn from(file: ConvertedFile) -> Self {
        Self {
            bytes: file.bytes,
            file_name: file.file_name,
        }
    }
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// `undefined`/`null` selects the hall preset; an object overrides fields.
/// Validation happens when the pipeline is built.
fn params_from_js(params: JsValue) -> Result<EffectParameters, JsValue> {
    if params.is_undefined() || params.is_null() {
        return Ok(EffectParameters::hall());
    }
    serde_wasm_bindgen::from_value(params).map_err(to_js)
}

/// WASM-exposed: render PCM already decoded by the browser.
///
/// `right` may be empty for mono sources.
#[wasm_bindgen]
pub fn convert_pcm(
    left: Vec<f32>,
    right: Vec<f32>,
    sample_rate: u32,
    file_name: &str,
    params: JsValue,
    progress: Option<ProgressReporter>,
) -> Result<ReverbOutput, JsValue> {
    let params = params_from_js(params)?;
    let channels = if right.is_empty() { vec![left] } else { vec![left, right] };
    let source = SampleBuffer::new(channels, sample_rate)
        .map_err(|e| to_js(ReverbError::Decode(e.into())))?;

    let reverb = ReverbPipeline::new(params).map_err(to_js)?;
    let mut sink = JsProgress(progress.as_ref());
    let bytes = reverb.render_wav(source, &mut sink).map_err(to_js)?;
    Ok(ReverbOutput {
        bytes,
        file_name: pipeline::output_file_name(file_name),
    })
}

/// WASM-exposed: decode and render a WAV or MP3 file with the built-in decoders.
#[cfg(feature = "decoders")]
#[wasm_bindgen]
pub fn convert_file(
    bytes: &[u8],
    file_name: &str,
    params: JsValue,
    progress: Option<ProgressReporter>,
) -> Result<ReverbOutput, JsValue> {
    let params = params_from_js(params)?;
    let reverb = ReverbPipeline::new(params).map_err(to_js)?;
    let mut sink = JsProgress(progress.as_ref());
    reverb
        .convert(&decode::AutoDecoder, bytes, file_name, &mut sink)
        .map(ReverbOutput::from)
        .map_err(to_js)
}

/// WASM-exposed: validate a picked file before reading it.
#[wasm_bindgen]
pub fn check_upload(size: f64, mime: &str) -> Result<(), JsValue> {
    pipeline::check_input(size as u64, mime).map_err(to_js)
}

/// WASM-exposed: estimated render-stage percentage for timer-driven progress bars.
#[wasm_bindgen]
pub fn estimated_render_percent(elapsed_ms: f64, duration_secs: f64) -> f32 {
    progress::estimated_render_percent(elapsed_ms, duration_secs)
}

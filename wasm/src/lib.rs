use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use wasm_bindgen::prelude::*;
use whispernet_core::{
    BfskConfig, BfskDemodulator, BfskModulator, ModemError, SyncState, DEFAULT_AMPLITUDE,
    DEFAULT_F0, DEFAULT_F1, DEFAULT_SAMPLE_RATE, DEFAULT_SYMBOL_RATE,
};

fn to_js(e: ModemError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Fill unset parameters with the modem defaults
fn config_from(
    sample_rate: Option<u32>,
    f0: Option<f32>,
    f1: Option<f32>,
    symbol_rate: Option<u32>,
    amplitude: Option<f32>,
) -> BfskConfig {
    BfskConfig {
        sample_rate: sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
        f0: f0.unwrap_or(DEFAULT_F0),
        f1: f1.unwrap_or(DEFAULT_F1),
        symbol_rate: symbol_rate.unwrap_or(DEFAULT_SYMBOL_RATE),
        amplitude: amplitude.unwrap_or(DEFAULT_AMPLITUDE),
    }
}

#[wasm_bindgen]
pub struct WasmModulator {
    inner: BfskModulator,
}

#[wasm_bindgen]
impl WasmModulator {
    #[wasm_bindgen(constructor)]
    pub fn new(
        sample_rate: Option<u32>,
        f0: Option<f32>,
        f1: Option<f32>,
        symbol_rate: Option<u32>,
        amplitude: Option<f32>,
    ) -> Result<WasmModulator, JsValue> {
        BfskModulator::new(config_from(sample_rate, f0, f1, symbol_rate, amplitude))
            .map(|inner| WasmModulator { inner })
            .map_err(to_js)
    }

    /// Frame and modulate raw bytes
    /// Takes a Uint8Array and returns a Float32Array ready for playback
    #[wasm_bindgen]
    pub fn transmit(&self, payload: &[u8]) -> Result<Vec<f32>, JsValue> {
        self.inner.transmit(payload).map_err(to_js)
    }

    /// Frame and modulate a UTF-8 string
    #[wasm_bindgen(js_name = transmitText)]
    pub fn transmit_text(&self, text: &str) -> Result<Vec<f32>, JsValue> {
        self.transmit(text.as_bytes())
    }

    /// Playback length of a framed payload of `payload_len` bytes
    #[wasm_bindgen(js_name = durationSecs)]
    pub fn duration_secs(&self, payload_len: usize) -> f64 {
        self.inner
            .duration_secs(payload_len + whispernet_core::FRAME_OVERHEAD)
    }
}

#[wasm_bindgen]
pub struct WasmDemodulator {
    inner: BfskDemodulator,
    level: Arc<AtomicU32>,
}

#[wasm_bindgen]
impl WasmDemodulator {
    #[wasm_bindgen(constructor)]
    pub fn new(
        sample_rate: Option<u32>,
        f0: Option<f32>,
        f1: Option<f32>,
        symbol_rate: Option<u32>,
    ) -> Result<WasmDemodulator, JsValue> {
        let config = config_from(sample_rate, f0, f1, symbol_rate, None);
        let level = Arc::new(AtomicU32::new(0.0f32.to_bits()));
        let meter = Arc::clone(&level);

        BfskDemodulator::with_level_meter(config, move |rms| {
            meter.store(rms.to_bits(), Ordering::Relaxed)
        })
        .map(|inner| WasmDemodulator { inner, level })
        .map_err(to_js)
    }

    /// Feed one capture chunk (Float32Array)
    /// Returns an Array of Uint8Array, one per message completed by this chunk
    #[wasm_bindgen]
    pub fn feed(&mut self, samples: &[f32]) -> js_sys::Array {
        self.inner
            .feed(samples)
            .iter()
            .map(|payload| js_sys::Uint8Array::from(payload.as_slice()))
            .collect()
    }

    /// RMS level of the most recent chunk
    #[wasm_bindgen]
    pub fn level(&self) -> f32 {
        f32::from_bits(self.level.load(Ordering::Relaxed))
    }

    #[wasm_bindgen(getter)]
    pub fn locked(&self) -> bool {
        self.inner.state() == SyncState::Locked
    }

    /// Stop listening: drops sync and any partial frame
    #[wasm_bindgen]
    pub fn stop(&mut self) {
        self.inner.reset();
        self.level.store(0.0f32.to_bits(), Ordering::Relaxed);
    }
}

/// Decode a received payload as UTF-8 text
#[wasm_bindgen(js_name = decodeText)]
pub fn decode_text(payload: &[u8]) -> Result<String, JsValue> {
    whispernet_core::decode_text(payload).map_err(to_js)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        assert_eq!(config_from(None, None, None, None, None), BfskConfig::default());

        let config = config_from(Some(44100), Some(1200.0), None, Some(300), None);
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.f0, 1200.0);
        assert_eq!(config.f1, DEFAULT_F1);
        assert_eq!(config.symbol_rate, 300);
    }

    #[test]
    fn test_level_tracks_last_chunk() {
        let mut demod = WasmDemodulator::new(None, None, None, None).unwrap();
        assert_eq!(demod.level(), 0.0);

        // Drive the core demodulator directly; the Array return needs a JS host
        demod.inner.feed(&[0.5, -0.5, 0.5, -0.5]);
        assert!((demod.level() - 0.5).abs() < 1e-6);

        demod.stop();
        assert_eq!(demod.level(), 0.0);
        assert!(!demod.locked());
    }
}

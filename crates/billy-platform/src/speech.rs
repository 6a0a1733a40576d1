//! Voice input through the browser's speech recognition service.
//!
//! Chrome and Safari only expose `webkitSpeechRecognition`, which
//! web-sys does not bind, so the recognizer is driven through
//! `js_sys::Reflect`.

use js_sys::{Array, Function, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};

use billy_types::{BillyError, Result};

const LANGUAGE: &str = "en-US";

fn constructor() -> Option<Function> {
    let window = gloo_utils::window();
    ["SpeechRecognition", "webkitSpeechRecognition"]
        .iter()
        .find_map(|name| {
            Reflect::get(&window, &JsValue::from_str(name))
                .ok()?
                .dyn_into::<Function>()
                .ok()
        })
}

/// The browser can transcribe speech.
pub fn is_supported() -> bool {
    constructor().is_some()
}

fn speech_error(context: &str, err: JsValue) -> BillyError {
    BillyError::Other(format!("{}: {:?}", context, err))
}

fn set(target: &JsValue, key: &str, value: &JsValue) -> Result<()> {
    Reflect::set(target, &JsValue::from_str(key), value)
        .map(|_| ())
        .map_err(|e| speech_error(key, e))
}

fn call(target: &JsValue, method: &str) -> Result<()> {
    let function = Reflect::get(target, &JsValue::from_str(method))
        .ok()
        .and_then(|f| f.dyn_into::<Function>().ok())
        .ok_or_else(|| BillyError::Other(format!("Recognizer has no {}()", method)))?;
    function
        .call0(target)
        .map(|_| ())
        .map_err(|e| speech_error(method, e))
}

/// Concatenated transcript of every result in a `result` event.
pub fn transcript_of(event: &JsValue) -> Option<String> {
    let results = Reflect::get(event, &JsValue::from_str("results")).ok()?;
    let length = Reflect::get(&results, &JsValue::from_str("length"))
        .ok()?
        .as_f64()? as u32;
    let mut transcript = String::new();
    for i in 0..length {
        let result = Reflect::get_u32(&results, i).ok()?;
        let best = Reflect::get_u32(&result, 0).ok()?;
        if let Some(text) = Reflect::get(&best, &JsValue::from_str("transcript"))
            .ok()
            .and_then(|t| t.as_string())
        {
            transcript.push_str(&text);
        }
    }
    let transcript = transcript.trim().to_string();
    (!transcript.is_empty()).then_some(transcript)
}

/// One utterance being listened to. Dropping it aborts recognition
/// without firing the callbacks.
pub struct SpeechSession {
    recognition: JsValue,
    _onresult: Closure<dyn FnMut(JsValue)>,
    _onend: Closure<dyn FnMut(JsValue)>,
}

impl SpeechSession {
    /// Start listening. `on_transcript` receives the running transcript
    /// of the utterance; `on_end` runs once recognition stops, including
    /// after an error.
    pub fn start(
        on_transcript: impl Fn(String) + 'static,
        on_end: impl Fn() + 'static,
    ) -> Result<Self> {
        let ctor = constructor()
            .ok_or_else(|| BillyError::Other("Speech recognition is not supported".to_string()))?;
        let recognition = Reflect::construct(&ctor, &Array::new())
            .map_err(|e| speech_error("SpeechRecognition", e))?;
        set(&recognition, "lang", &JsValue::from_str(LANGUAGE))?;
        set(&recognition, "continuous", &JsValue::FALSE)?;
        set(&recognition, "interimResults", &JsValue::TRUE)?;

        let onresult = Closure::wrap(Box::new(move |event: JsValue| {
            match transcript_of(&event) {
                Some(text) => on_transcript(text),
                None => log::debug!("Speech result without a transcript"),
            }
        }) as Box<dyn FnMut(JsValue)>);
        let onend = Closure::wrap(Box::new(move |_event: JsValue| {
            log::info!("Voice input ended");
            on_end();
        }) as Box<dyn FnMut(JsValue)>);
        set(&recognition, "onresult", onresult.as_ref())?;
        set(&recognition, "onend", onend.as_ref())?;

        call(&recognition, "start")?;
        log::info!("Voice input started ({})", LANGUAGE);
        Ok(Self {
            recognition,
            _onresult: onresult,
            _onend: onend,
        })
    }

    /// Stop listening; the final result and `on_end` still arrive.
    pub fn stop(&self) {
        if let Err(e) = call(&self.recognition, "stop") {
            log::warn!("Could not stop voice input: {}", e);
        }
    }
}

impl Drop for SpeechSession {
    fn drop(&mut self) {
        // handlers must be detached before the closures are freed
        for key in ["onresult", "onend"] {
            if let Err(e) = set(&self.recognition, key, &JsValue::NULL) {
                log::debug!("{}", e);
            }
        }
        if let Err(e) = call(&self.recognition, "abort") {
            log::debug!("{}", e);
        }
    }
}

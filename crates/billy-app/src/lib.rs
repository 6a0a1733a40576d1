//! Billy Bets app: WASM entry point.
//!
//! This crate is the composition root. It builds the platform adapters
//! from the compiled-in configuration and hands them to the egui UI.

mod app;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

const CANVAS_ID: &str = "billy_canvas";

fn canvas() -> Result<web_sys::HtmlCanvasElement, String> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or("No document")?;
    document
        .get_element_by_id(CANVAS_ID)
        .ok_or_else(|| format!("No canvas element with id '{}'", CANVAS_ID))?
        .dyn_into::<web_sys::HtmlCanvasElement>()
        .map_err(|_| format!("Element '{}' is not a canvas", CANVAS_ID))
}

/// WASM entry point, called from index.html
#[wasm_bindgen(start)]
pub async fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Billy Bets starting...");

    let canvas = match canvas() {
        Ok(canvas) => canvas,
        Err(e) => {
            log::error!("{}", e);
            return;
        }
    };
    let web_options = eframe::WebOptions::default();

    wasm_bindgen_futures::spawn_local(async move {
        let started = eframe::WebRunner::new()
            .start(
                canvas,
                web_options,
                Box::new(|cc| Ok(Box::new(app::BillyApp::new(cc)?))),
            )
            .await;
        if let Err(e) = started {
            log::error!("Failed to start eframe: {:?}", e);
        }
    });
}

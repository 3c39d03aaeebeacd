//! TodoList dApp WASM frontend.
//!
//! Connects to the injected wallet, binds the deployed TodoList contract and
//! renders its tasks into a pending and a completed list.

pub mod api;
pub mod app;
pub mod dom;
pub mod events;
pub mod provider;
pub mod view;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// WASM entry point: runs the app once the window has loaded.
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    // Improve panic messages in the browser console
    console_error_panic_hook::set_once();

    if dom::document()?.ready_state() == "complete" {
        wasm_bindgen_futures::spawn_local(app::load());
        return Ok(());
    }

    let cb = Closure::once(move || wasm_bindgen_futures::spawn_local(app::load()));
    dom::window()?.add_event_listener_with_callback("load", cb.as_ref().unchecked_ref())?;
    cb.forget();
    Ok(())
}

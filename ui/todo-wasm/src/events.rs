//! Event binding.
//!
//! Async handlers are spawned via `wasm_bindgen_futures::spawn_local`.

use gloo_console as console;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::app::AppSession;
use crate::dom::{self, Elements};

/// Wire each rendered checkbox to `toggleCompleted(id)`; the page reloads once
/// the transaction is accepted.
pub fn bind_toggle_handlers(els: &Elements, session: Rc<AppSession>) {
    for input in els.task_checkboxes() {
        let Ok(id) = input.name().parse::<u64>() else {
            continue;
        };
        let session = session.clone();
        let cb = Closure::wrap(Box::new(move |_: web_sys::MouseEvent| {
            let session = session.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match session.toggle_completed(id).await {
                    Ok(tx_hash) => {
                        console::log!(format!("toggled task {id} in {tx_hash}"));
                        if let Ok(window) = dom::window() {
                            let _ = window.location().reload();
                        }
                    }
                    Err(err) => console::error!(err.to_string()),
                }
            });
        }) as Box<dyn FnMut(_)>);
        if let Err(err) = input.add_event_listener_with_callback("click", cb.as_ref().unchecked_ref()) {
            console::error!("failed to bind checkbox", err);
        }
        cb.forget();
    }
}

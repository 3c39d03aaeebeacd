//! Bridge to the wallet provider injected into the page.
//!
//! Modern wallets expose `window.ethereum` with an EIP-1193 `request` method.
//! Legacy dapp browsers expose `window.web3.currentProvider`, which may only
//! implement the callback-style `sendAsync`.

use async_trait::async_trait;
use js_sys::{Function, Promise, Reflect};
use serde::Serialize;
use serde_json::{Value, json};
use td_provider::{Eip1193, ProviderError};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::dom;

#[derive(Clone)]
pub struct InjectedProvider {
    inner: JsValue,
}

impl InjectedProvider {
    /// `window.ethereum`
    pub fn modern() -> Option<Self> {
        let window = dom::window().ok()?;
        present(Reflect::get(&window, &JsValue::from_str("ethereum")).ok()?).map(|inner| Self { inner })
    }

    /// `window.web3.currentProvider`
    pub fn legacy() -> Option<Self> {
        let window = dom::window().ok()?;
        let web3 = present(Reflect::get(&window, &JsValue::from_str("web3")).ok()?)?;
        present(Reflect::get(&web3, &JsValue::from_str("currentProvider")).ok()?).map(|inner| Self { inner })
    }

    fn method(&self, name: &str) -> Option<Function> {
        Reflect::get(&self.inner, &JsValue::from_str(name))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok())
    }

    /// Wrap the callback-style `sendAsync(payload, cb)` in a promise.
    fn send_async(&self, send: Function, payload: JsValue) -> Promise {
        let inner = self.inner.clone();
        Promise::new(&mut |resolve: Function, reject: Function| {
            let on_error = reject.clone();
            let cb = Closure::once_into_js(move |err: JsValue, response: JsValue| {
                if present(err.clone()).is_some() {
                    let _ = on_error.call1(&JsValue::NULL, &err);
                    return;
                }
                let error = Reflect::get(&response, &JsValue::from_str("error")).unwrap_or(JsValue::UNDEFINED);
                if present(error.clone()).is_some() {
                    let _ = on_error.call1(&JsValue::NULL, &error);
                } else {
                    let result = Reflect::get(&response, &JsValue::from_str("result")).unwrap_or(JsValue::UNDEFINED);
                    let _ = resolve.call1(&JsValue::NULL, &result);
                }
            });
            if let Err(err) = send.call2(&inner, &payload, &cb) {
                let _ = reject.call1(&JsValue::NULL, &err);
            }
        })
    }
}

#[async_trait(?Send)]
impl Eip1193 for InjectedProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let js_payload = payload
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let promise = if let Some(request) = self.method("request") {
            request
                .call1(&self.inner, &js_payload)
                .map_err(js_error)?
                .dyn_into::<Promise>()
                .map_err(|_| ProviderError::Transport("request() did not return a promise".to_string()))?
        } else if let Some(send) = self.method("sendAsync") {
            self.send_async(send, js_payload)
        } else {
            return Err(ProviderError::Transport(
                "provider exposes neither request nor sendAsync".to_string(),
            ));
        };

        let result = JsFuture::from(promise).await.map_err(js_error)?;
        serde_wasm_bindgen::from_value(result).map_err(|e| ProviderError::Decode(format!("{method}: {e}")))
    }
}

fn present(value: JsValue) -> Option<JsValue> {
    if value.is_undefined() || value.is_null() {
        None
    } else {
        Some(value)
    }
}

/// Map a rejected provider promise to a typed error, keeping the EIP-1193 code.
fn js_error(err: JsValue) -> ProviderError {
    let code = Reflect::get(&err, &JsValue::from_str("code"))
        .ok()
        .and_then(|c| c.as_f64());
    let message = Reflect::get(&err, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", err));

    match code {
        Some(code) => ProviderError::Rpc {
            code: code as i64,
            message,
        },
        None => ProviderError::Transport(message),
    }
}

//! Static asset loading.
//!
//! The contract artifact is fetched by path relative to the page.

use async_trait::async_trait;
use td_api_types::ContractArtifact;
use td_contract_client::{ArtifactSource, ContractError};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, Response};

use crate::dom;

/// Fetch a URL and return the body as a plain string.
pub async fn fetch_text(url: &str) -> Result<String, String> {
    let opts = RequestInit::new();
    opts.set_method("GET");

    let request = Request::new_with_str_and_init(url, &opts).map_err(|e| format!("{:?}", e))?;

    let window = dom::window().map_err(|e| format!("{:?}", e))?;
    let resp_value = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(|e| format!("fetch error: {:?}", e))?;

    let resp: Response = resp_value
        .dyn_into()
        .map_err(|_| "not a Response".to_string())?;

    if !resp.ok() {
        return Err(format!("{} {}", resp.status(), resp.status_text()));
    }

    let text = JsFuture::from(resp.text().map_err(|e| format!("{:?}", e))?)
        .await
        .map_err(|e| format!("text error: {:?}", e))?;

    Ok(text.as_string().unwrap_or_default())
}

/// Artifact source backed by `window.fetch`.
pub struct FetchArtifactSource;

#[async_trait(?Send)]
impl ArtifactSource for FetchArtifactSource {
    async fn fetch_artifact(&self, path: &str) -> Result<ContractArtifact, ContractError> {
        let raw = fetch_text(path)
            .await
            .map_err(|e| ContractError::Artifact(format!("GET {path}: {e}")))?;
        td_contract_client::parse_artifact(&raw)
    }
}

use axum::{Json, extract::State};
use serde_json::Value;
use std::sync::Arc;
use td_api_types::{RpcRequest, RpcResponse};
use td_contract_memory::DevChain;
use tracing::{debug, warn};

use crate::AppState;

/// JSON-RPC 2.0 endpoint. Reads share the chain lock, transactions take it exclusively.
pub(crate) async fn rpc(State(state): State<Arc<AppState>>, Json(request): Json<RpcRequest>) -> Json<RpcResponse> {
    debug!(id = %request.id, method = %request.method, "rpc");
    let params = if request.params.is_null() {
        Value::Array(Vec::new())
    } else {
        request.params
    };

    let result = if DevChain::is_read_only(&request.method) {
        state.chain.read().await.query(&request.method, &params)
    } else {
        state.chain.write().await.dispatch(&request.method, &params)
    };

    Json(match result {
        Ok(value) => RpcResponse::ok(request.id, value),
        Err(err) => {
            warn!(method = %request.method, code = err.code, "rpc error: {}", err.message);
            RpcResponse::err(request.id, err.code, err.message)
        }
    })
}

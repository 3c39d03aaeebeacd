//! The load pipeline as run in the browser.

use gloo_console as console;
use std::rc::Rc;
use td_contract_client::{RpcTodoList, TODO_LIST_ARTIFACT};
use td_provider::ProviderError;
use td_session::{Session, SessionError};

use crate::api::FetchArtifactSource;
use crate::dom::{self, Elements};
use crate::events;
use crate::provider::InjectedProvider;
use crate::view::DomView;

pub type AppSession = Session<RpcTodoList<InjectedProvider>>;

/// Detect the wallet, bind the contract, render the tasks.
pub async fn load() {
    let els = match Elements::bind() {
        Ok(els) => els,
        Err(err) => {
            console::error!("page is missing required elements", err);
            return;
        }
    };

    let detected = td_provider::detect(InjectedProvider::modern(), InjectedProvider::legacy());
    let mut session = AppSession::new();
    let mut view = DomView::new(&els);

    let outcome = session
        .load(detected, &FetchArtifactSource, TODO_LIST_ARTIFACT, &mut view)
        .await;

    match outcome {
        Ok(count) => {
            console::log!(format!("rendered {count} tasks"));
            events::bind_toggle_handlers(&els, Rc::new(session));
        }
        Err(err) if err.is_authorization_denied() => {
            if let Ok(window) = dom::window() {
                let _ = window.alert_with_message(&ProviderError::AuthorizationDenied.to_string());
            }
        }
        Err(SessionError::Provider {
            source: ProviderError::ProviderUnavailable,
            ..
        }) => {
            console::log!(td_provider::NO_PROVIDER_MESSAGE);
        }
        Err(err) => console::error!(err.to_string()),
    }
}

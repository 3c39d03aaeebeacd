//! DOM element bindings.
//!
//! All fields are resolved once, when the page has loaded.

use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlElement, HtmlInputElement};

// ── Helpers ──

pub fn window() -> Result<web_sys::Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))
}

pub fn document() -> Result<Document, JsValue> {
    window()?
        .document()
        .ok_or_else(|| JsValue::from_str("window has no document"))
}

pub fn by_id_typed<T: JsCast>(id: &str) -> Option<T> {
    document()
        .ok()?
        .get_element_by_id(id)
        .and_then(|e| e.dyn_into::<T>().ok())
}

pub fn query_typed<T: JsCast>(selector: &str) -> Option<T> {
    document()
        .ok()?
        .query_selector(selector)
        .ok()?
        .and_then(|e| e.dyn_into::<T>().ok())
}

/// Elements under `parent` matching `selector`.
pub fn query_all_within(parent: &Element, selector: &str) -> Vec<Element> {
    let Ok(nl) = parent.query_selector_all(selector) else {
        return Vec::new();
    };
    let mut v = Vec::new();
    for i in 0..nl.length() {
        if let Some(e) = nl.item(i) {
            if let Ok(el) = e.dyn_into::<Element>() {
                v.push(el);
            }
        }
    }
    v
}

pub fn show(el: &HtmlElement) {
    let _ = el.style().remove_property("display");
}

pub fn hide(el: &HtmlElement) {
    let _ = el.style().set_property("display", "none");
}

pub fn remove_class(el: &Element, cls: &str) {
    let _ = el.class_list().remove_1(cls);
}

// ── Elements struct ──

/// Clone-friendly (all inner types are reference-counted via JS GC).
#[derive(Clone)]
pub struct Elements {
    pub account: HtmlElement,
    pub loader: HtmlElement,
    pub content: HtmlElement,
    pub task_list: HtmlElement,
    pub completed_task_list: HtmlElement,
    pub task_template: HtmlElement,
}

macro_rules! get_html {
    ($id:expr) => {
        by_id_typed::<HtmlElement>($id)
            .ok_or_else(|| JsValue::from_str(&format!("missing element #{}", $id)))?
    };
}

impl Elements {
    pub fn bind() -> Result<Elements, JsValue> {
        Ok(Elements {
            account: get_html!("account"),
            loader: get_html!("loader"),
            content: get_html!("content"),
            task_list: get_html!("taskList"),
            completed_task_list: get_html!("completedTaskList"),
            task_template: query_typed::<HtmlElement>(".taskTemplate")
                .ok_or_else(|| JsValue::from_str("missing .taskTemplate"))?,
        })
    }

    /// Task checkboxes in both lists (the template's own checkbox excluded).
    pub fn task_checkboxes(&self) -> Vec<HtmlInputElement> {
        [&self.task_list, &self.completed_task_list]
            .into_iter()
            .flat_map(|list| query_all_within(list, "input"))
            .filter_map(|el| el.dyn_into::<HtmlInputElement>().ok())
            .collect()
    }
}

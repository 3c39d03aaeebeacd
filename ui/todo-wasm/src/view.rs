//! DOM rendering of the two task lists.

use gloo_console as console;
use td_api_types::Task;
use td_session::TaskView;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlElement, HtmlInputElement};

use crate::dom::{self, Elements};

pub struct DomView<'a> {
    els: &'a Elements,
}

impl<'a> DomView<'a> {
    pub fn new(els: &'a Elements) -> Self {
        Self { els }
    }

    /// Clone the hidden template, fill it in and append it to `list`.
    fn append(&self, list: &HtmlElement, task: &Task) -> Result<(), JsValue> {
        let row: HtmlElement = self
            .els
            .task_template
            .clone_node_with_deep(true)?
            .dyn_into()
            .map_err(|_| JsValue::from_str("task template is not an element"))?;
        dom::remove_class(&row, "taskTemplate");

        if let Some(content) = row.query_selector(".content")? {
            content.set_text_content(Some(&task.content));
        }
        if let Some(input) = row.query_selector("input")? {
            let input: HtmlInputElement = input
                .dyn_into()
                .map_err(|_| JsValue::from_str("task checkbox is not an input"))?;
            input.set_name(&task.id.to_string());
            input.set_checked(task.done);
        }

        list.append_child(&row)?;
        dom::show(&row);
        Ok(())
    }
}

impl TaskView for DomView<'_> {
    fn set_account(&mut self, account: &str) {
        self.els.account.set_text_content(Some(account));
    }

    fn append_pending(&mut self, task: &Task) {
        if let Err(err) = self.append(&self.els.task_list, task) {
            console::error!(format!("failed to render task {}", task.id), err);
        }
    }

    fn append_completed(&mut self, task: &Task) {
        if let Err(err) = self.append(&self.els.completed_task_list, task) {
            console::error!(format!("failed to render task {}", task.id), err);
        }
    }

    fn show_loader(&mut self) {
        dom::show(&self.els.loader);
        dom::hide(&self.els.content);
    }

    fn show_content(&mut self) {
        dom::hide(&self.els.loader);
        dom::show(&self.els.content);
    }
}

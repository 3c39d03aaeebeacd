//! Task Renderer and Loading-State Toggle.

use td_api_types::Task;
use td_contract_client::{ContractError, TodoList};
use tracing::debug;

/// Rendering target: two task lists, an account label and a loader/content pair.
pub trait TaskView {
    fn set_account(&mut self, account: &str);
    fn append_pending(&mut self, task: &Task);
    fn append_completed(&mut self, task: &Task);
    fn show_loader(&mut self);
    fn show_content(&mut self);
}

/// Flip between the loader and the content container.
pub fn toggle_loading<V: TaskView + ?Sized>(view: &mut V, loading: bool) {
    if loading {
        view.show_loader();
    } else {
        view.show_content();
    }
}

/// Read `taskCount` then each task by index, one read at a time, and append
/// each to the list matching its `done` flag. Existing rows are left in place.
///
/// Returns the number of rows appended.
pub async fn render_tasks<C, V>(contract: &C, view: &mut V) -> Result<u64, ContractError>
where
    C: TodoList + ?Sized,
    V: TaskView + ?Sized,
{
    let count = contract.task_count().await?;
    debug!(count, "rendering tasks");

    for index in 0..count {
        let task = contract.task(index).await?;
        if task.done {
            view.append_completed(&task);
        } else {
            view.append_pending(&task);
        }
    }
    Ok(count)
}

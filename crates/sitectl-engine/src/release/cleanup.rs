//! Compensating actions for multi-step filesystem operations
//!
//! Actions are registered as each step succeeds and run in reverse order
//! when the stack is dropped. `on_failure` actions are skipped once
//! [`CleanupStack::complete`] has been called; `always` actions run either way.

use sitectl_core::errors::Result;

type Action = Box<dyn FnOnce() -> Result<()>>;

struct Entry {
    label: &'static str,
    always: bool,
    action: Action,
}

#[derive(Default)]
pub struct CleanupStack {
    entries: Vec<Entry>,
    completed: bool,
}

impl CleanupStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action that undoes a step if the operation fails
    pub fn on_failure<F>(&mut self, label: &'static str, action: F)
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        self.entries.push(Entry {
            label,
            always: false,
            action: Box::new(action),
        });
    }

    /// Register an action that runs whether or not the operation succeeds
    pub fn always<F>(&mut self, label: &'static str, action: F)
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        self.entries.push(Entry {
            label,
            always: true,
            action: Box::new(action),
        });
    }

    /// Mark the operation as successful
    pub fn complete(&mut self) {
        self.completed = true;
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    fn unwind(&mut self) {
        while let Some(entry) = self.entries.pop() {
            if self.completed && !entry.always {
                continue;
            }
            match (entry.action)() {
                Ok(()) => tracing::debug!(step = entry.label, "cleanup step ran"),
                Err(err) => tracing::warn!(
                    step = entry.label,
                    err.code = err.code(),
                    error = %err,
                    "cleanup step failed"
                ),
            }
        }
    }
}

impl Drop for CleanupStack {
    fn drop(&mut self) {
        self.unwind();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitectl_core::errors::SiteError;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn FnOnce() -> Result<()>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let handle = log.clone();
        let make = move |name: &'static str| {
            let log = handle.clone();
            Box::new(move || {
                log.borrow_mut().push(name);
                Ok(())
            }) as Box<dyn FnOnce() -> Result<()>>
        };
        (log, make)
    }

    #[test]
    fn test_failure_runs_everything_in_reverse() {
        let (log, make) = recorder();
        {
            let mut stack = CleanupStack::new();
            stack.always("source", make("remove source"));
            stack.on_failure("tmp", make("remove tmp"));
            stack.on_failure("pointer", make("restore pointer"));
        }
        assert_eq!(
            *log.borrow(),
            vec!["restore pointer", "remove tmp", "remove source"]
        );
    }

    #[test]
    fn test_complete_keeps_only_always_actions() {
        let (log, make) = recorder();
        {
            let mut stack = CleanupStack::new();
            stack.always("source", make("remove source"));
            stack.on_failure("tmp", make("remove tmp"));
            stack.complete();
        }
        assert_eq!(*log.borrow(), vec!["remove source"]);
    }

    #[test]
    fn test_failing_action_does_not_stop_unwind() {
        let (log, make) = recorder();
        {
            let mut stack = CleanupStack::new();
            stack.on_failure("first", make("first"));
            stack.on_failure("broken", || Err(SiteError::internal("boom")));
        }
        assert_eq!(*log.borrow(), vec!["first"]);
    }
}

//! Publish/subscribe message bus.
//!
//! Components register handlers per message name and post JSON payloads.
//! Handlers run synchronously in registration order. Registration requires an
//! explicit [`Owner`] token so a component's handlers can be dropped together
//! without the bus guessing who registered what.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

/// Well-known message names.
pub mod messages {
    pub const COLLECTION_LOADED: &str = "collectionLoaded";
    pub const DATA_READY: &str = "dataReady";
    pub const STARTED_RENDERING: &str = "startedRendering";
    pub const DONE_RENDERING: &str = "doneRendering";
    pub const RENDER_ERROR_FATAL: &str = "renderError:Fatal";
    pub const MESSAGES: &str = "messages";
    pub const DISPLAY_SPAN_COMMENT: &str = "displaySpanComment";
    pub const DISPLAY_ARC_COMMENT: &str = "displayArcComment";
    pub const MOUSE_OVER: &str = "mouseover";
    pub const MOUSE_OUT: &str = "mouseout";
}

/// Opaque registration owner, issued by [`Dispatcher::owner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Owner(u64);

type Handler = Rc<dyn Fn(&Value) -> bool>;

struct Registration {
    owner: Owner,
    handler: Handler,
}

#[derive(Default)]
struct Inner {
    handlers: IndexMap<String, Vec<Registration>>,
}

/// Synchronous, single-threaded message dispatcher.
///
/// Handlers may post further messages from inside a handler; the handler list
/// for the in-flight post is snapshotted first.
#[derive(Default)]
pub struct Dispatcher {
    inner: RefCell<Inner>,
    next_owner: Cell<u64>,
}

impl Dispatcher {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Issues a fresh owner token.
    pub fn owner(&self) -> Owner {
        let id = self.next_owner.get();
        self.next_owner.set(id + 1);
        Owner(id)
    }

    /// Registers a handler for `message`. Handlers run in registration order.
    pub fn on<F>(&self, message: &str, owner: Owner, handler: F)
    where
        F: Fn(&Value) + 'static,
    {
        self.on_vetoable(message, owner, move |args| {
            handler(args);
            true
        });
    }

    /// Registers a handler whose `false` return vetoes [`Dispatcher::post_all`].
    pub fn on_vetoable<F>(&self, message: &str, owner: Owner, handler: F)
    where
        F: Fn(&Value) -> bool + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        inner
            .handlers
            .entry(message.to_string())
            .or_default()
            .push(Registration {
                owner,
                handler: Rc::new(handler),
            });
    }

    /// Removes every handler registered under `owner`.
    pub fn off(&self, owner: Owner) {
        let mut inner = self.inner.borrow_mut();
        for (_, regs) in inner.handlers.iter_mut() {
            regs.retain(|r| r.owner != owner);
        }
    }

    /// Removes `owner`'s handlers for one message only.
    pub fn off_message(&self, message: &str, owner: Owner) {
        let mut inner = self.inner.borrow_mut();
        if let Some(regs) = inner.handlers.get_mut(message) {
            regs.retain(|r| r.owner != owner);
        }
    }

    fn snapshot(&self, message: &str) -> Vec<Handler> {
        let inner = self.inner.borrow();
        inner
            .handlers
            .get(message)
            .map(|regs| regs.iter().map(|r| Rc::clone(&r.handler)).collect())
            .unwrap_or_default()
    }

    /// Posts `args` to every handler of `message`. Returns the handler count.
    pub fn post(&self, message: &str, args: &Value) -> usize {
        let handlers = self.snapshot(message);
        let n = handlers.len();
        for h in handlers {
            let _ = h(args);
        }
        n
    }

    /// Posts to every handler and returns `false` if any handler vetoed.
    /// All handlers run even after a veto.
    pub fn post_all(&self, message: &str, args: &Value) -> bool {
        let mut ok = true;
        for h in self.snapshot(message) {
            if !h(args) {
                ok = false;
            }
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn handlers_run_in_registration_order() {
        let d = Dispatcher::new();
        let owner = d.owner();
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let log = Rc::clone(&log);
            d.on("m", owner, move |_| log.borrow_mut().push(tag));
        }
        d.post("m", &Value::Null);
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn off_removes_only_that_owner() {
        let d = Dispatcher::new();
        let a = d.owner();
        let b = d.owner();
        let hits = Rc::new(Cell::new(0));
        {
            let hits = Rc::clone(&hits);
            d.on("m", a, move |_| hits.set(hits.get() + 1));
        }
        {
            let hits = Rc::clone(&hits);
            d.on("m", b, move |_| hits.set(hits.get() + 10));
        }
        d.off(a);
        d.post("m", &Value::Null);
        assert_eq!(hits.get(), 10);
    }

    #[test]
    fn any_veto_fails_the_whole_post() {
        let d = Dispatcher::new();
        let owner = d.owner();
        d.on_vetoable("isReloadOkay", owner, |_| true);
        d.on_vetoable("isReloadOkay", owner, |_| false);
        assert!(!d.post_all("isReloadOkay", &Value::Null));
        assert!(d.post_all("unheard", &Value::Null));
    }

    #[test]
    fn handlers_may_post_reentrantly() {
        let d = Dispatcher::new();
        let owner = d.owner();
        let hits = Rc::new(Cell::new(0));
        {
            let d2 = Rc::clone(&d);
            d.on("outer", owner, move |_| {
                d2.post("inner", &json!({"depth": 1}));
            });
        }
        {
            let hits = Rc::clone(&hits);
            d.on("inner", owner, move |_| hits.set(hits.get() + 1));
        }
        d.post("outer", &Value::Null);
        assert_eq!(hits.get(), 1);
    }
}

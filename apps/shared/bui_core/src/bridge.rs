//! Bridge: data and callback routing between two panels
//!
//! A [`Bridge`] is created for every panel-open request. The requesting side
//! (the *in-panel*, or the system) queues data with [`Bridge::send`]; the panel
//! opened through it (the *out-panel*) subscribes and drains the queue. Data
//! sent before the out-panel exists waits in the queue and is delivered, in
//! order, to the first subscriber.
//!
//! # Notifications
//!
//! - `on_create`: the out-panel was instantiated (fired once per bridge)
//! - `on_callback`: the out-panel sent a result back toward the in-panel
//! - `on_release`: the out-panel was destroyed
//!
//! # Delivery
//!
//! The subscriber is called with the queued batch and is expected to drain it;
//! anything it leaves behind stays queued ahead of later sends. A `send` made
//! from inside the subscriber only enqueues: the running delivery picks the
//! payload up once the subscriber returns, so nothing is delivered twice and
//! the subscriber is never re-entered.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use bui_schema::{BridgeInfo, ShowModel};
use tracing::{debug, trace, warn};

use crate::error::{CoreError, Result};
use crate::event::Event;
use crate::panel::PanelId;
use crate::payload::Payload;

/// Pending payloads of a bridge, oldest first
pub type DataQueue = VecDeque<Payload>;

type Subscriber = Box<dyn FnMut(&mut DataQueue)>;

/// Identifies one [`Bridge::attach_subscriber`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberToken(u64);

struct BridgeInner {
    info: BridgeInfo,
    in_panel: Cell<Option<PanelId>>,
    out_panel: Cell<Option<PanelId>>,
    queue: RefCell<DataQueue>,
    subscriber: RefCell<Option<Subscriber>>,
    /// Bumped whenever the subscriber slot changes hands
    generation: Cell<u64>,
    /// Bumped by `reset`; leftovers of an older epoch are dropped
    epoch: Cell<u64>,
    delivering: Cell<bool>,
    on_release: Event<Bridge>,
    on_callback: Event<(PanelId, Payload)>,
    on_create: Event<PanelId>,
}

/// Shared handle to a routing object; clones refer to the same bridge
#[derive(Clone)]
pub struct Bridge {
    inner: Rc<BridgeInner>,
}

impl Bridge {
    pub fn new(info: BridgeInfo) -> Self {
        Self {
            inner: Rc::new(BridgeInner {
                info,
                in_panel: Cell::new(None),
                out_panel: Cell::new(None),
                queue: RefCell::new(VecDeque::new()),
                subscriber: RefCell::new(None),
                generation: Cell::new(0),
                epoch: Cell::new(0),
                delivering: Cell::new(false),
                on_release: Event::new(),
                on_callback: Event::new(),
                on_create: Event::new(),
            }),
        }
    }

    pub fn from_route(in_node: impl Into<String>, out_node: impl Into<String>, show_model: ShowModel) -> Self {
        Self::new(BridgeInfo::new(in_node, out_node, show_model))
    }

    pub fn info(&self) -> &BridgeInfo {
        &self.inner.info
    }

    pub fn in_node(&self) -> &str {
        &self.inner.info.in_node
    }

    pub fn out_node(&self) -> &str {
        &self.inner.info.out_node
    }

    pub fn show_model(&self) -> ShowModel {
        self.inner.info.show_model
    }

    /// `in->out` label used in logs
    pub fn route(&self) -> String {
        format!("{}->{}", self.in_node(), self.out_node())
    }

    /// Panel that owns this bridge, `None` when opened by the system
    pub fn in_panel(&self) -> Option<PanelId> {
        self.inner.in_panel.get()
    }

    /// Panel opened through this bridge, set once by [`notify_created`](Self::notify_created)
    pub fn out_panel(&self) -> Option<PanelId> {
        self.inner.out_panel.get()
    }

    pub fn ptr_eq(&self, other: &Bridge) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn on_release(&self) -> &Event<Bridge> {
        &self.inner.on_release
    }

    pub fn on_callback(&self) -> &Event<(PanelId, Payload)> {
        &self.inner.on_callback
    }

    pub fn on_create(&self) -> &Event<PanelId> {
        &self.inner.on_create
    }

    /// Recycle the bridge for a new connection owned by `in_panel`
    ///
    /// Drops the subscriber, the create and callback listeners and every
    /// pending payload. Release listeners and the out-panel stay as they are.
    pub fn reset(&self, in_panel: Option<PanelId>) {
        self.inner.in_panel.set(in_panel);
        self.inner.on_create.clear();
        self.inner.on_callback.clear();
        self.inner.subscriber.borrow_mut().take();
        self.bump_generation();
        self.inner.epoch.set(self.inner.epoch.get() + 1);
        self.inner.queue.borrow_mut().clear();
        trace!(bridge = %self.route(), "Reset");
    }

    /// Queue a payload and hand the queue to the subscriber, if any
    pub fn send(&self, payload: impl Into<Payload>) {
        let payload = payload.into();
        trace!(bridge = %self.route(), "Send {}", payload.kind());
        self.inner.queue.borrow_mut().push_back(payload);
        self.deliver();
    }

    /// Replace the subscriber; a non-empty backlog is delivered right away
    pub fn attach_subscriber<F>(&self, subscriber: F) -> SubscriberToken
    where
        F: FnMut(&mut DataQueue) + 'static,
    {
        *self.inner.subscriber.borrow_mut() = Some(Box::new(subscriber));
        let token = SubscriberToken(self.bump_generation());
        self.deliver();
        token
    }

    /// Remove the subscriber, but only if `token` is still the current one
    pub fn detach_subscriber(&self, token: SubscriberToken) -> bool {
        if self.inner.generation.get() != token.0 {
            return false;
        }
        let removed = self.inner.subscriber.borrow_mut().take().is_some();
        self.bump_generation();
        removed || self.inner.delivering.get()
    }

    pub fn has_subscriber(&self) -> bool {
        self.inner.subscriber.borrow().is_some()
    }

    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Send a result from `panel` back toward the in-panel
    pub fn call_back(&self, panel: PanelId, payload: impl Into<Payload>) {
        let payload = payload.into();
        if self.inner.on_callback.is_empty() {
            trace!(bridge = %self.route(), "Callback from {} dropped, no listener", panel);
            return;
        }
        self.inner.on_callback.emit(&(panel, payload));
    }

    /// Record the out-panel and fire `on_create`
    ///
    /// A second call is a programming error: it is rejected and the first
    /// out-panel is kept, since listeners have already observed it.
    pub fn notify_created(&self, panel: PanelId) -> Result<()> {
        if let Some(first) = self.inner.out_panel.get() {
            warn!(bridge = %self.route(), "Out-panel already set to {}, rejecting {}", first, panel);
            return Err(CoreError::BridgeAlreadyCreated {
                route: self.route(),
                first,
                rejected: panel,
            });
        }
        self.inner.out_panel.set(Some(panel));
        debug!(bridge = %self.route(), "Created {}", panel);
        self.inner.on_create.emit(&panel);
        Ok(())
    }

    /// Fire `on_release`; state is left for the owner to reset or discard
    pub fn release(&self) {
        debug!(bridge = %self.route(), "Released");
        self.inner.on_release.emit(self);
    }

    fn bump_generation(&self) -> u64 {
        let next = self.inner.generation.get() + 1;
        self.inner.generation.set(next);
        next
    }

    fn deliver(&self) {
        if self.inner.delivering.get() {
            return;
        }
        let Some(mut subscriber) = self.inner.subscriber.borrow_mut().take() else {
            return;
        };
        let generation = self.inner.generation.get();
        let epoch = self.inner.epoch.get();

        self.inner.delivering.set(true);
        loop {
            let mut batch = std::mem::take(&mut *self.inner.queue.borrow_mut());
            if batch.is_empty() {
                break;
            }
            subscriber(&mut batch);

            if !batch.is_empty() {
                if self.inner.epoch.get() == epoch {
                    let mut queue = self.inner.queue.borrow_mut();
                    batch.append(&mut queue);
                    *queue = batch;
                }
                break;
            }
            if self.inner.generation.get() != generation {
                break;
            }
        }
        self.inner.delivering.set(false);

        if self.inner.generation.get() == generation {
            *self.inner.subscriber.borrow_mut() = Some(subscriber);
        } else if self.has_subscriber() && self.pending() > 0 {
            // Replaced mid-delivery: the new subscriber gets what is left.
            self.deliver();
        }
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("info", &self.inner.info)
            .field("in_panel", &self.in_panel())
            .field("out_panel", &self.out_panel())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn settings_bridge() -> Bridge {
        Bridge::from_route("", "Settings", ShowModel::Overlay)
    }

    fn collect(log: &Rc<RefCell<Vec<Value>>>) -> impl FnMut(&mut DataQueue) + 'static {
        let log = log.clone();
        move |queue: &mut DataQueue| {
            while let Some(payload) = queue.pop_front() {
                if let Payload::Value(v) = payload {
                    log.borrow_mut().push(v);
                }
            }
        }
    }

    #[test]
    fn test_backlog_delivered_in_order_to_first_subscriber() {
        let bridge = settings_bridge();
        for i in 0..3 {
            bridge.send(json!(i));
        }
        assert_eq!(bridge.pending(), 3);

        let log = Rc::new(RefCell::new(Vec::new()));
        bridge.attach_subscriber(collect(&log));
        bridge.send(json!(3));

        assert_eq!(*log.borrow(), vec![json!(0), json!(1), json!(2), json!(3)]);
        assert_eq!(bridge.pending(), 0);
    }

    #[test]
    fn test_undrained_payloads_stay_queued() {
        let bridge = settings_bridge();
        let seen = Rc::new(Cell::new(0));
        let s = seen.clone();
        bridge.attach_subscriber(move |queue: &mut DataQueue| s.set(s.get() + queue.len()));

        bridge.send(json!(1));
        bridge.send(json!(2));
        // Second call saw both payloads again: the subscriber owns draining.
        assert_eq!(seen.get(), 1 + 2);
        assert_eq!(bridge.pending(), 2);
    }

    #[test]
    fn test_reentrant_send_is_delivered_once() {
        let bridge = settings_bridge();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (b, l) = (bridge.clone(), log.clone());
        bridge.attach_subscriber(move |queue: &mut DataQueue| {
            while let Some(Payload::Value(v)) = queue.pop_front() {
                if v == json!("ping") {
                    b.send(json!("pong"));
                }
                l.borrow_mut().push(v);
            }
        });

        bridge.send(json!("ping"));
        assert_eq!(*log.borrow(), vec![json!("ping"), json!("pong")]);
        assert_eq!(bridge.pending(), 0);
        assert!(bridge.has_subscriber());
    }

    #[test]
    fn test_reset_clears_queue_and_subscriber() {
        let bridge = settings_bridge();
        let log = Rc::new(RefCell::new(Vec::new()));
        bridge.attach_subscriber(collect(&log));
        bridge.on_create().subscribe(|_| {});
        bridge.on_callback().subscribe(|_| {});
        let released = Rc::new(Cell::new(false));
        let r = released.clone();
        bridge.on_release().subscribe(move |_| r.set(true));

        let owner = PanelId::from_raw(9);
        bridge.reset(Some(owner));
        bridge.send(json!(1));

        assert!(!bridge.has_subscriber());
        assert!(log.borrow().is_empty());
        assert_eq!(bridge.pending(), 1);
        assert!(bridge.on_create().is_empty());
        assert!(bridge.on_callback().is_empty());
        assert_eq!(bridge.in_panel(), Some(owner));

        bridge.reset(None);
        assert_eq!(bridge.pending(), 0);
        bridge.release();
        assert!(released.get());
    }

    #[test]
    fn test_reset_inside_subscriber_drops_leftovers() {
        let bridge = settings_bridge();
        let b = bridge.clone();
        bridge.attach_subscriber(move |_queue: &mut DataQueue| b.reset(None));
        bridge.send(json!(1));

        assert_eq!(bridge.pending(), 0);
        assert!(!bridge.has_subscriber());
    }

    #[test]
    fn test_detach_with_stale_token() {
        let bridge = settings_bridge();
        let first = bridge.attach_subscriber(|_| {});
        let second = bridge.attach_subscriber(|_| {});
        assert!(!bridge.detach_subscriber(first));
        assert!(bridge.has_subscriber());
        assert!(bridge.detach_subscriber(second));
        assert!(!bridge.has_subscriber());
    }

    #[test]
    fn test_notify_created_only_once() {
        let bridge = settings_bridge();
        let created = Rc::new(RefCell::new(Vec::new()));
        let c = created.clone();
        bridge.on_create().subscribe(move |id: &PanelId| c.borrow_mut().push(*id));

        let first = PanelId::from_raw(1);
        let second = PanelId::from_raw(2);
        assert!(bridge.notify_created(first).is_ok());
        assert!(matches!(
            bridge.notify_created(second),
            Err(CoreError::BridgeAlreadyCreated { .. })
        ));

        assert_eq!(bridge.out_panel(), Some(first));
        assert_eq!(*created.borrow(), vec![first]);
    }

    #[test]
    fn test_call_back_reaches_listener() {
        let bridge = settings_bridge();
        bridge.call_back(PanelId::from_raw(1), json!("ignored"));

        let got = Rc::new(RefCell::new(None));
        let g = got.clone();
        bridge
            .on_callback()
            .subscribe(move |(panel, payload): &(PanelId, Payload)| {
                *g.borrow_mut() = Some((*panel, payload.kind()));
            });
        bridge.call_back(PanelId::from_raw(1), json!({"ok": true}));

        assert_eq!(*got.borrow(), Some((PanelId::from_raw(1), "map")));
    }
}

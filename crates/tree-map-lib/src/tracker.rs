//! Viewport change detection
//!
//! Map widgets redraw every frame while the user drags or scrolls. Only the
//! settled result of a gesture (move end, zoom end) is worth acting on, so the
//! tracker swallows intermediate frames and relays the rest to subscribers.

use crate::ViewportBounds;
use std::collections::BTreeMap;
use std::fmt;

/// Bounds equality tolerance in degrees, well below a screen pixel at any zoom
const SETTLE_EPSILON: f64 = 1e-9;

/// What the map widget reports each frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapFrame {
    pub bounds: ViewportBounds,
    pub zoom: f64,
    /// A drag, scroll or zoom animation is in progress
    pub interacting: bool,
}

/// A settled viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportChange {
    pub bounds: ViewportBounds,
    pub zoom: f64,
}

impl ViewportChange {
    fn approx_eq(&self, other: &ViewportChange) -> bool {
        (self.zoom - other.zoom).abs() <= SETTLE_EPSILON
            && self.bounds.approx_eq(&other.bounds, SETTLE_EPSILON)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&ViewportChange) + Send>;

/// Emits a [`ViewportChange`] on the first frame and whenever the view settles
#[derive(Default)]
pub struct BoundsTracker {
    previous: Option<ViewportChange>,
    last_emitted: Option<ViewportChange>,
    subscribers: BTreeMap<SubscriptionId, Callback>,
    next_id: u64,
}

impl fmt::Debug for BoundsTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundsTracker")
            .field("previous", &self.previous)
            .field("last_emitted", &self.last_emitted)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl BoundsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_viewport_change(
        &mut self,
        callback: impl FnMut(&ViewportChange) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.insert(id, Box::new(callback));
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    /// Feed one frame; returns the change if this frame settled the view
    pub fn observe(&mut self, frame: MapFrame) -> Option<ViewportChange> {
        let current = ViewportChange {
            bounds: frame.bounds,
            zoom: frame.zoom,
        };
        let previous = self.previous.replace(current);

        if frame.interacting {
            return None;
        }

        let settled = match (&previous, &self.last_emitted) {
            (_, None) => true,
            (Some(previous), Some(emitted)) => {
                previous.approx_eq(&current) && !emitted.approx_eq(&current)
            }
            (None, Some(_)) => false,
        };
        if !settled {
            return None;
        }

        tracing::debug!(bounds = %current.bounds, zoom = current.zoom, "Viewport settled");
        self.last_emitted = Some(current);
        for callback in self.subscribers.values_mut() {
            callback(&current);
        }
        Some(current)
    }

    /// The last observed frame has not been relayed yet
    ///
    /// Callers keep redrawing while this holds so the settling frame is seen.
    pub fn is_settling(&self) -> bool {
        match (&self.previous, &self.last_emitted) {
            (Some(previous), Some(emitted)) => !previous.approx_eq(emitted),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Most recent settled viewport
    pub fn last_emitted(&self) -> Option<&ViewportChange> {
        self.last_emitted.as_ref()
    }

    /// Forget the last emission so the next settled frame is relayed again
    pub fn reset(&mut self) {
        self.previous = None;
        self.last_emitted = None;
    }
}

//! # Collision Callbacks
//!
//! After every [`PhysicsWorld::step`](crate::PhysicsWorld::step) the world
//! walks the kernel's persistent manifolds. Each manifold is shown to the
//! handler of both participating bodies, then every handler is told the walk
//! is over.
//!
//! [`ContactTracker`] turns that stream into enter/stay/exit events.

use parking_lot::Mutex;
use ramjet_kernel::{NativeHandle, PersistentManifold};
use std::sync::Arc;

/// Receives the contact manifolds of one body.
pub trait CollisionCallbackHandler: Send {
    /// Called once per manifold the body takes part in.
    fn on_visit_manifold(&mut self, manifold: &PersistentManifold);

    /// Called once per step after all manifolds were visited.
    fn on_finished_visiting_manifolds(&mut self);
}

/// Contact transition for one pair of objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactEvent {
    /// First step with a touching contact.
    Enter(NativeHandle),
    /// Still touching.
    Stay(NativeHandle),
    /// Stopped touching.
    Exit(NativeHandle),
}

/// Shared reader for the events a [`ContactTracker`] produces.
#[derive(Clone, Debug, Default)]
pub struct ContactEvents {
    events: Arc<Mutex<Vec<ContactEvent>>>,
}

impl ContactEvents {
    /// Takes every event produced since the last drain.
    #[must_use]
    pub fn drain(&self) -> Vec<ContactEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of undrained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// True when nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

/// Handler tracking which objects touch one body.
///
/// Only manifolds with at least one penetrating contact count as touching.
#[derive(Debug)]
pub struct ContactTracker {
    owner: NativeHandle,
    touching: Vec<NativeHandle>,
    previous: Vec<NativeHandle>,
    out: ContactEvents,
}

impl ContactTracker {
    /// Creates a tracker for the body whose native handle is `owner`.
    ///
    /// # Returns
    ///
    /// The handler to register and the reader for its events.
    #[must_use]
    pub fn new(owner: NativeHandle) -> (Self, ContactEvents) {
        let out = ContactEvents::default();
        let tracker = Self {
            owner,
            touching: Vec::new(),
            previous: Vec::new(),
            out: out.clone(),
        };
        (tracker, out)
    }
}

impl CollisionCallbackHandler for ContactTracker {
    fn on_visit_manifold(&mut self, manifold: &PersistentManifold) {
        if !manifold.contacts.iter().any(|c| c.distance <= 0.0) {
            return;
        }
        let other = if manifold.body0 == self.owner {
            manifold.body1
        } else {
            manifold.body0
        };
        if !self.touching.contains(&other) {
            self.touching.push(other);
        }
    }

    fn on_finished_visiting_manifolds(&mut self) {
        let mut events = self.out.events.lock();
        for &other in &self.touching {
            if self.previous.contains(&other) {
                events.push(ContactEvent::Stay(other));
            } else {
                events.push(ContactEvent::Enter(other));
            }
        }
        for &other in &self.previous {
            if !self.touching.contains(&other) {
                events.push(ContactEvent::Exit(other));
            }
        }
        drop(events);

        std::mem::swap(&mut self.previous, &mut self.touching);
        self.touching.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ramjet_core::SlotId;
    use ramjet_kernel::ContactPoint;
    use ramjet_shared::Vec3;

    fn handle(index: u32) -> NativeHandle {
        NativeHandle::from_slot(SlotId::new(index, 0))
    }

    fn manifold(a: NativeHandle, b: NativeHandle, distance: f32) -> PersistentManifold {
        PersistentManifold {
            body0: a,
            body1: b,
            contacts: vec![ContactPoint {
                position_world_on_a: Vec3::ZERO,
                position_world_on_b: Vec3::ZERO,
                normal_world_on_b: Vec3::Y,
                distance,
            }],
        }
    }

    #[test]
    fn test_enter_stay_exit() {
        let (me, other) = (handle(1), handle(2));
        let (mut tracker, events) = ContactTracker::new(me);

        tracker.on_visit_manifold(&manifold(other, me, -0.1));
        tracker.on_finished_visiting_manifolds();
        assert_eq!(events.drain(), vec![ContactEvent::Enter(other)]);

        tracker.on_visit_manifold(&manifold(me, other, -0.05));
        tracker.on_finished_visiting_manifolds();
        assert_eq!(events.drain(), vec![ContactEvent::Stay(other)]);

        tracker.on_finished_visiting_manifolds();
        assert_eq!(events.drain(), vec![ContactEvent::Exit(other)]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_separated_manifold_ignored() {
        let (me, other) = (handle(1), handle(2));
        let (mut tracker, events) = ContactTracker::new(me);
        tracker.on_visit_manifold(&manifold(me, other, 0.2));
        tracker.on_finished_visiting_manifolds();
        assert_eq!(events.len(), 0);
    }
}

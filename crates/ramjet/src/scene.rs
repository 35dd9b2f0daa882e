//! # Scene Objects
//!
//! The host-side composite the registry registers: a named object with an
//! ordered component list. Components are bodies, constraints and behaviour
//! slots; the registry discovers them by kind, inactive ones included.

use crate::behaviour::PhysicsComponent;
use crate::body::{BodyId, PhysicsBody, WorldRegistrar};
use crate::constraint::Constraint;
use crate::world::PhysicsWorld;
use serde::{Deserialize, Serialize};

/// Host-chosen identity of a scene object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// A behaviour plus its enabled flag.
///
/// A destroyed slot keeps its place in the component list so indices stay
/// stable; the registry prunes it from the schedule.
pub struct BehaviourSlot {
    behaviour: Option<Box<dyn PhysicsComponent>>,
    enabled: bool,
}

impl BehaviourSlot {
    /// Enabled slot holding `behaviour`.
    #[must_use]
    pub fn new(behaviour: Box<dyn PhysicsComponent>) -> Self {
        Self {
            behaviour: Some(behaviour),
            enabled: true,
        }
    }

    /// The behaviour, `None` once destroyed.
    #[must_use]
    pub fn behaviour(&self) -> Option<&dyn PhysicsComponent> {
        self.behaviour.as_deref()
    }

    pub(crate) fn behaviour_mut(&mut self) -> Option<&mut (dyn PhysicsComponent + 'static)> {
        self.behaviour.as_deref_mut()
    }

    /// True if the slot has been destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.behaviour.is_none()
    }

    /// False for behaviours skipped by the pre-tick hook.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or disables the behaviour.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Takes the behaviour out, leaving a destroyed slot.
    pub fn destroy(&mut self) -> Option<Box<dyn PhysicsComponent>> {
        self.behaviour.take()
    }
}

impl std::fmt::Debug for BehaviourSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviourSlot")
            .field("type_key", &self.behaviour.as_ref().map(|b| b.type_key()))
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// One component of a scene object.
#[derive(Debug)]
pub enum Component {
    /// Physics body.
    Body(PhysicsBody),
    /// Joint between bodies.
    Constraint(Constraint),
    /// Per-tick callback.
    Behaviour(BehaviourSlot),
}

/// A composite host object.
#[derive(Debug)]
pub struct SceneObject {
    id: ObjectId,
    name: String,
    active: bool,
    components: Vec<Component>,
}

impl SceneObject {
    /// Active object without components.
    #[must_use]
    pub fn new(id: ObjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            active: true,
            components: Vec::new(),
        }
    }

    /// Returns the object with `body` appended.
    #[must_use]
    pub fn with_body(mut self, body: PhysicsBody) -> Self {
        self.components.push(Component::Body(body));
        self
    }

    /// Returns the object with `constraint` appended.
    #[must_use]
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.components.push(Component::Constraint(constraint));
        self
    }

    /// Returns the object with `behaviour` appended.
    #[must_use]
    pub fn with_behaviour(mut self, behaviour: impl PhysicsComponent + 'static) -> Self {
        self.push_behaviour(Box::new(behaviour));
        self
    }

    /// Appends a component. Changes take effect on the next registration.
    pub fn push(&mut self, component: Component) {
        self.components.push(component);
    }

    /// Appends a behaviour.
    pub fn push_behaviour(&mut self, behaviour: Box<dyn PhysicsComponent>) {
        self.components
            .push(Component::Behaviour(BehaviourSlot::new(behaviour)));
    }

    /// Object id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    /// Object name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// False while the whole object is disabled; its behaviours do not tick.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Activates or deactivates the object.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Components in declaration order.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub(crate) fn component_mut(&mut self, index: usize) -> Option<&mut Component> {
        self.components.get_mut(index)
    }

    /// Bodies in declaration order.
    pub fn bodies(&self) -> impl Iterator<Item = &PhysicsBody> {
        self.components.iter().filter_map(|c| match c {
            Component::Body(body) => Some(body),
            _ => None,
        })
    }

    /// Bodies in declaration order, mutably.
    pub fn bodies_mut(&mut self) -> impl Iterator<Item = &mut PhysicsBody> {
        self.components.iter_mut().filter_map(|c| match c {
            Component::Body(body) => Some(body),
            _ => None,
        })
    }

    /// Body with `id`.
    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&PhysicsBody> {
        self.bodies().find(|body| body.id() == id)
    }

    /// Body with `id`, mutably.
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut PhysicsBody> {
        self.bodies_mut().find(|body| body.id() == id)
    }

    /// Constraints in declaration order.
    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.components.iter().filter_map(|c| match c {
            Component::Constraint(constraint) => Some(constraint),
            _ => None,
        })
    }

    /// Constraints in declaration order, mutably.
    pub fn constraints_mut(&mut self) -> impl Iterator<Item = &mut Constraint> {
        self.components.iter_mut().filter_map(|c| match c {
            Component::Constraint(constraint) => Some(constraint),
            _ => None,
        })
    }

    /// Behaviour slot at component `index`.
    #[must_use]
    pub fn behaviour_slot(&self, index: usize) -> Option<&BehaviourSlot> {
        match self.components.get(index) {
            Some(Component::Behaviour(slot)) => Some(slot),
            _ => None,
        }
    }

    /// Behaviour slot at component `index`, mutably.
    pub fn behaviour_slot_mut(&mut self, index: usize) -> Option<&mut BehaviourSlot> {
        match self.components.get_mut(index) {
            Some(Component::Behaviour(slot)) => Some(slot),
            _ => None,
        }
    }

    /// Destroys the behaviour at component `index`.
    pub fn destroy_behaviour(&mut self, index: usize) -> Option<Box<dyn PhysicsComponent>> {
        self.behaviour_slot_mut(index).and_then(BehaviourSlot::destroy)
    }

    /// Disposes every native object owned, constraints first.
    ///
    /// Used on objects no longer registered with a registry.
    pub fn dispose(&mut self, world: &mut PhysicsWorld) {
        for constraint in self.constraints_mut() {
            constraint.dispose(world);
        }
        for body in self.bodies_mut() {
            body.dispose(world);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviour::TickContext;
    use ramjet_kernel::CollisionShape;
    use ramjet_shared::Transform;

    struct Noop;

    impl PhysicsComponent for Noop {
        fn type_key(&self) -> &'static str {
            "noop"
        }

        fn physics_update(&mut self, _dt: f32, _ctx: &mut TickContext<'_>) {}
    }

    #[test]
    fn test_components_keep_declaration_order() {
        let sphere = CollisionShape::Sphere { radius: 1.0 };
        let mut object = SceneObject::new(ObjectId(1), "crate")
            .with_behaviour(Noop)
            .with_body(PhysicsBody::collision_object(BodyId(4), sphere, Transform::IDENTITY))
            .with_body(PhysicsBody::collision_object(BodyId(9), sphere, Transform::IDENTITY));

        let ids: Vec<_> = object.bodies().map(PhysicsBody::id).collect();
        assert_eq!(ids, vec![BodyId(4), BodyId(9)]);
        assert!(object.body(BodyId(9)).is_some());

        assert!(object.behaviour_slot(1).is_none());
        assert!(object.destroy_behaviour(0).is_some());
        assert!(object.behaviour_slot(0).unwrap().is_destroyed());
        assert!(object.destroy_behaviour(0).is_none());
        assert_eq!(object.components().len(), 3);
    }
}

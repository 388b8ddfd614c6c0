//! The simulator: world state ownership and the fixed per-tick pipeline

use slotmap::{SecondaryMap, SlotMap};

use crate::body::{BodyBlueprint, BodyId, RigidBody};
use crate::collision::{
    CollisionEvent, CollisionHandler, CollisionSpace, Geom, GeomContext, GeomId, NarrowContext,
    Shape, SpaceSlot,
};
use crate::config::PhysicsConfig;
use crate::dynamics::{BodyState, ContactGroup, World};
use crate::foundation::math::Vec3;

/// Owner of a dynamics world, the two standing collision spaces, the
/// per-step contact group and all live bodies and geoms.
///
/// `frame_move` is the sole mutating entry point of a simulation tick and
/// must not be interleaved with state reads/writes; everything here runs on
/// one logical thread.
pub struct Simulator {
    name: String,
    config: PhysicsConfig,
    world: World,
    static_space: CollisionSpace,
    actor_space: CollisionSpace,
    contact_group: ContactGroup,
    geoms: SlotMap<GeomId, Geom>,
    bodies: SlotMap<BodyId, RigidBody>,
    handlers: SecondaryMap<GeomId, CollisionHandler>,
    continuous: Vec<GeomId>,
    /// Row `c` holds the bitmask of categories that category `c` collides
    /// with. Fixed once any body exists.
    category_collide_flags: [u32; 32],
}

impl Simulator {
    /// Create a simulator configured from `config`.
    pub fn new(name: impl Into<String>, config: PhysicsConfig) -> Self {
        let name = name.into();
        Self {
            world: World::new(&config),
            static_space: CollisionSpace::new(format!("{name}-static"), true),
            actor_space: CollisionSpace::new(format!("{name}-actor"), true),
            contact_group: ContactGroup::new(),
            geoms: SlotMap::with_key(),
            bodies: SlotMap::with_key(),
            handlers: SecondaryMap::new(),
            continuous: Vec::new(),
            // As a default, all categories collide with each other.
            category_collide_flags: [u32::MAX; 32],
            config,
            name,
        }
    }

    /// Simulator name for diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configuration this simulator was built with
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// The dynamics world
    pub fn world(&self) -> &World {
        &self.world
    }

    /// All live geoms
    pub fn geoms(&self) -> &SlotMap<GeomId, Geom> {
        &self.geoms
    }

    /// Borrow a live body.
    ///
    /// # Panics
    /// Panics on a stale id; use [`Simulator::try_body`] when unsure.
    pub fn body(&self, id: BodyId) -> &RigidBody {
        &self.bodies[id]
    }

    /// Borrow a live body, or `None` for a stale id.
    pub fn try_body(&self, id: BodyId) -> Option<&RigidBody> {
        self.bodies.get(id)
    }

    /// Mutably borrow a live body.
    ///
    /// # Panics
    /// Panics on a stale id.
    pub fn body_mut(&mut self, id: BodyId) -> &mut RigidBody {
        &mut self.bodies[id]
    }

    /// Mutably borrow a body together with the world, for handle-level
    /// accessor calls.
    pub fn body_and_world_mut(&mut self, id: BodyId) -> (&RigidBody, &mut World) {
        (&self.bodies[id], &mut self.world)
    }

    /// Whether no bodies exist
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Read-only query context over geoms, bodies and the world.
    pub fn geom_ctx(&self) -> GeomContext<'_> {
        GeomContext {
            geoms: &self.geoms,
            bodies: &self.bodies,
            world: &self.world,
        }
    }

    /// Advance the simulation by one fixed step.
    pub fn frame_move(&mut self, dt: f32) {
        self.advance_continuous_geoms();

        // Actor-vs-static without stop-event bookkeeping, then the actor
        // space against itself with full lifecycle tracking.
        let mut ctx = NarrowContext {
            geoms: &self.geoms,
            bodies: &self.bodies,
            world: &self.world,
            handlers: &mut self.handlers,
            contacts: &mut self.contact_group,
        };
        self.actor_space.collide(&mut ctx, Some(&self.static_space), false);
        self.actor_space.collide(&mut ctx, None, true);

        self.handle_body_velocities();

        self.world.quick_step(dt, &self.contact_group);

        self.contact_group.clear();
    }

    // ---------- body management ----------

    /// Create a live body from a blueprint.
    ///
    /// Non-sensor geoms are added to the static or actor space according to
    /// the blueprint's static flag; sensors are left space-less for the
    /// caller to place. Static bodies are put to sleep immediately.
    pub fn instantiate(&mut self, blueprint: &BodyBlueprint) -> BodyId {
        self.instantiate_parts(
            blueprint.name.clone(),
            blueprint.is_static,
            blueprint.cog,
            &blueprint.geoms,
        )
    }

    /// Create a live body by deep-cloning another live body, geoms
    /// included. Used for proxy creation.
    pub fn instantiate_clone(&mut self, source: BodyId) -> BodyId {
        let (name, is_static, cog, templates) = {
            let source_body = &self.bodies[source];
            let templates: Vec<Geom> = source_body
                .geoms
                .iter()
                .map(|&g| self.geoms[g].clone())
                .collect();
            (
                source_body.name.clone(),
                source_body.is_static,
                source_body.cog,
                templates,
            )
        };
        self.instantiate_parts(name, is_static, cog, &templates)
    }

    fn instantiate_parts(
        &mut self,
        name: String,
        is_static: bool,
        cog: Vec3,
        templates: &[Geom],
    ) -> BodyId {
        let state = self.world.insert(BodyState {
            enabled: !is_static,
            ..Default::default()
        });

        let body_id = self.bodies.insert(RigidBody {
            name,
            is_static,
            cog,
            state,
            geoms: Vec::new(),
            user_data: None,
            mass_initialized: false,
        });

        for template in templates {
            let mut geom = template.clone();
            geom.body = Some(body_id);
            geom.space = None;
            geom.collide_bits = self.collide_flags(geom.category);
            if let Shape::Continuous(state) = &mut geom.shape {
                // The sweep has no motion to cover yet.
                *state = Default::default();
                geom.enabled = false;
            }

            let sensor = geom.sensor;
            let geom_id = self.add_geom(body_id, geom);
            if !sensor {
                let slot = if is_static {
                    SpaceSlot::Static
                } else {
                    SpaceSlot::Actor
                };
                self.set_geom_space(geom_id, Some(slot));
            }
        }

        body_id
    }

    /// Attach a geom to a body, aggregating its mass into the body's
    /// total. The geom is not added to any space.
    pub fn add_geom(&mut self, body_id: BodyId, mut geom: Geom) -> GeomId {
        geom.body = Some(body_id);

        // Non-sensor geoms with mass contribute inertia, rotated into the
        // body frame by their offset.
        if !geom.sensor && geom.material.mass != 0.0 {
            let mass = geom
                .shape
                .mass_properties(geom.material.mass)
                .rotated(&geom.offset.rotation);
            if mass.mass != 0.0 {
                let body = &mut self.bodies[body_id];
                let state = self.world.body_mut(body.state);
                if body.mass_initialized {
                    state.mass.add(&mass);
                } else {
                    state.mass = mass;
                    body.mass_initialized = true;
                }
            }
        }

        if matches!(geom.shape, Shape::Continuous(_)) {
            let id = self.geoms.insert(geom);
            self.continuous.push(id);
            self.bodies[body_id].geoms.push(id);
            return id;
        }

        let id = self.geoms.insert(geom);
        self.bodies[body_id].geoms.push(id);
        id
    }

    /// Add a body-less geom (heightfield terrain, standalone query rays),
    /// optionally placing it in a space. Its offset acts as its world
    /// pose.
    pub fn add_free_geom(&mut self, mut geom: Geom, slot: Option<SpaceSlot>) -> GeomId {
        geom.body = None;
        geom.space = None;
        geom.collide_bits = self.collide_flags(geom.category);
        let id = self.geoms.insert(geom);
        if slot.is_some() {
            self.set_geom_space(id, slot);
        }
        id
    }

    /// Detach a geom from its body, leaving it as a free geom frozen at
    /// its current world pose. It stops tracking the body and stops
    /// contributing to its mass from here on; the caller becomes
    /// responsible for its teardown via
    /// [`Simulator::destroy_free_geom`].
    pub fn detach_geom(&mut self, body: BodyId, geom: GeomId) {
        let Some(owner) = self.bodies.get_mut(body) else {
            log::error!("detach_geom from unknown body {body:?}");
            return;
        };
        let Some(index) = owner.geoms.iter().position(|&g| g == geom) else {
            log::error!("detach_geom: geom {geom:?} not owned by {}", owner.name);
            return;
        };
        owner.geoms.remove(index);

        let pose = self.geom_ctx().pose(geom);
        let detached = &mut self.geoms[geom];
        detached.body = None;
        detached.offset = pose;
        self.continuous.retain(|&g| g != geom);
    }

    /// Destroy a body-less geom, synthesizing stop events first.
    pub fn destroy_free_geom(&mut self, id: GeomId) {
        let Some(geom) = self.geoms.get(id) else {
            log::error!("destroy of unknown free geom {id:?}");
            return;
        };
        if geom.body.is_some() {
            debug_assert!(false, "destroy_free_geom on a body-owned geom");
            log::error!("destroy_free_geom on body-owned geom {}", geom.name);
            return;
        }
        self.disable_geom(id);
        self.set_geom_space(id, None);
        self.handlers.remove(id);
        self.geoms.remove(id);
    }

    /// Destroy a live body: synthesize stop events, detach its geoms from
    /// all spaces, then free the geoms, the body and its solver state, in
    /// that order.
    pub fn destroy_body(&mut self, id: BodyId) {
        let Some(body) = self.bodies.get(id) else {
            debug_assert!(false, "destroy of unknown body");
            log::error!("destroy of unknown body {id:?}");
            return;
        };
        let geom_ids = body.geoms.clone();
        let state = body.state;

        // Geoms leave the spaces before the body goes away so collision
        // bookkeeping never sees a dangling reference.
        for &geom_id in &geom_ids {
            self.disable_geom(geom_id);
            self.set_geom_space(geom_id, None);
        }
        for geom_id in geom_ids {
            self.handlers.remove(geom_id);
            self.continuous.retain(|&g| g != geom_id);
            self.geoms.remove(geom_id);
        }

        self.world.remove(state);
        self.bodies.remove(id);
    }

    /// Take a geom out of collision ahead of its destruction: the geom is
    /// flagged disabled and stop events are synthesized in both spaces.
    ///
    /// Must precede the destruction of any geom that may still be tracked
    /// in a colliding-pair set, since the natural stop event can no longer
    /// be generated once the geom is gone.
    pub fn disable_geom(&mut self, id: GeomId) {
        if let Some(geom) = self.geoms.get_mut(id) {
            geom.enabled = false;
        }
        let mut ctx = NarrowContext {
            geoms: &self.geoms,
            bodies: &self.bodies,
            world: &self.world,
            handlers: &mut self.handlers,
            contacts: &mut self.contact_group,
        };
        self.static_space.disable_geom(id, &mut ctx);
        self.actor_space.disable_geom(id, &mut ctx);
    }

    // ---------- space management ----------

    /// Move a geom to the given space slot (or out of all spaces).
    pub fn set_geom_space(&mut self, id: GeomId, slot: Option<SpaceSlot>) {
        let Some(geom) = self.geoms.get(id) else {
            log::error!("set_geom_space on unknown geom {id:?}");
            return;
        };
        let old = geom.space;
        if old == slot {
            return;
        }

        if let Some(old_slot) = old {
            // Leaving a space can orphan tracked pairs.
            let mut ctx = NarrowContext {
                geoms: &self.geoms,
                bodies: &self.bodies,
                world: &self.world,
                handlers: &mut self.handlers,
                contacts: &mut self.contact_group,
            };
            match old_slot {
                SpaceSlot::Static => {
                    self.static_space.disable_geom(id, &mut ctx);
                    self.static_space.remove_geom(id);
                }
                SpaceSlot::Actor => {
                    self.actor_space.disable_geom(id, &mut ctx);
                    self.actor_space.remove_geom(id);
                }
            }
        }

        if let Some(new_slot) = slot {
            let aabb = self.geom_ctx().aabb(id);
            match new_slot {
                SpaceSlot::Static => self.static_space.add_geom(id, aabb),
                SpaceSlot::Actor => self.actor_space.add_geom(id, aabb),
            }
        }

        self.geoms[id].space = slot;
    }

    /// Migrate all of a body's non-sensor geoms currently in `from` over
    /// to `to`.
    pub fn change_space(&mut self, body: BodyId, from: SpaceSlot, to: SpaceSlot) {
        let geom_ids = self.bodies[body].geoms.clone();
        for id in geom_ids {
            let geom = &self.geoms[id];
            if !geom.sensor && geom.space == Some(from) {
                self.set_geom_space(id, Some(to));
            }
        }
    }

    /// Remove all of a body's non-sensor geoms from whatever space they
    /// are in.
    pub fn remove_from_spaces(&mut self, body: BodyId) {
        let geom_ids = self.bodies[body].geoms.clone();
        for id in geom_ids {
            if !self.geoms[id].sensor {
                self.set_geom_space(id, None);
            }
        }
    }

    /// Replace the static space's backing structure with a quadtree. The
    /// space must be empty.
    pub fn make_static_space_quadtree(&mut self, center: Vec3, extents: Vec3, depth: u32) {
        self.static_space.make_quadtree(center, extents, depth);
    }

    /// Refresh a body's cached broad-phase bounds after an external pose
    /// change. Only quadtree-backed spaces cache bounds, so this is a
    /// no-op for plain spaces.
    pub fn update_body_bounds(&mut self, body: BodyId) {
        let geom_ids = self.bodies[body].geoms.clone();
        for id in geom_ids {
            let Some(slot) = self.geoms[id].space else {
                continue;
            };
            let aabb = self.geom_ctx().aabb(id);
            match slot {
                SpaceSlot::Static => self.static_space.update_geom(id, aabb),
                SpaceSlot::Actor => self.actor_space.update_geom(id, aabb),
            }
        }
    }

    /// The static space, for queries
    pub fn static_space(&self) -> &CollisionSpace {
        &self.static_space
    }

    /// The actor space, for queries
    pub fn actor_space(&self) -> &CollisionSpace {
        &self.actor_space
    }

    /// One-shot query of a single geom against one of the spaces.
    pub fn collide_geom(
        &self,
        slot: SpaceSlot,
        geom: GeomId,
        callback: impl FnMut(&CollisionEvent),
    ) {
        let space = match slot {
            SpaceSlot::Static => &self.static_space,
            SpaceSlot::Actor => &self.actor_space,
        };
        space.collide_geom(geom, &self.geom_ctx(), callback);
    }

    /// Enumerate all intersections of a ray geom with one of the spaces,
    /// ordered by distance.
    pub fn collide_ray_multiple(
        &self,
        slot: SpaceSlot,
        ray_geom: GeomId,
        callback: impl FnMut(&CollisionEvent),
    ) {
        let space = match slot {
            SpaceSlot::Static => &self.static_space,
            SpaceSlot::Actor => &self.actor_space,
        };
        space.collide_ray_multiple(ray_geom, &self.geom_ctx(), callback);
    }

    // ---------- sleep and static management ----------

    /// Put a body to sleep: velocities cleared, solver state disabled,
    /// non-sensor geoms migrated to the static space.
    pub fn sleep_body(&mut self, id: BodyId) {
        let state_key = self.bodies[id].state;
        let state = self.world.body_mut(state_key);
        state.clear_velocities();
        state.enabled = false;
        state.idle.reset();
        self.change_space(id, SpaceSlot::Actor, SpaceSlot::Static);
    }

    /// Wake a sleeping body and migrate its geoms back to the actor
    /// space. Waking a static body is a caller bug and is refused.
    pub fn wake_body(&mut self, id: BodyId) {
        let body = &self.bodies[id];
        if body.is_static {
            log::error!("attempt to wake static body {}; ignored", body.name);
            return;
        }
        let state = self.world.body_mut(body.state);
        state.enabled = true;
        state.idle.reset();
        self.change_space(id, SpaceSlot::Static, SpaceSlot::Actor);
    }

    /// Set or clear sleep state, with the space migration that keeps the
    /// sleep-space invariant.
    pub fn set_sleeping(&mut self, id: BodyId, sleeping: bool) {
        if sleeping {
            self.sleep_body(id);
        } else {
            self.wake_body(id);
        }
    }

    /// Change a body's static flag, zeroing velocities and forcing the
    /// sleep state consistent.
    pub fn set_static(&mut self, id: BodyId, is_static: bool) {
        if self.bodies[id].is_static == is_static {
            return;
        }

        if is_static {
            let state_key = self.bodies[id].state;
            let state = self.world.body_mut(state_key);
            state.clear_velocities();
            state.enabled = false;
            self.change_space(id, SpaceSlot::Actor, SpaceSlot::Static);
            self.bodies[id].is_static = true;
        } else {
            self.bodies[id].is_static = false;
            self.wake_body(id);
        }
    }

    /// Flag a body as submerged, increasing its damping.
    pub fn set_below_water(&mut self, id: BodyId, below: bool) {
        let state_key = self.bodies[id].state;
        self.world.body_mut(state_key).below_water = below;
    }

    /// Whether auto-disable may put the body to sleep.
    pub fn set_auto_disable(&mut self, id: BodyId, enabled: bool) {
        let state_key = self.bodies[id].state;
        self.world.body_mut(state_key).auto_disable = enabled;
    }

    // ---------- category filtering ----------

    /// Enable or disable collisions between two categories.
    ///
    /// Category bits are baked into geoms at body creation, so the matrix
    /// is frozen once any body exists; late calls are logged and ignored.
    pub fn enable_category_collisions(&mut self, cat1: u32, cat2: u32, enabled: bool) {
        if !self.check_matrix_mutable() || !check_category(cat1) || !check_category(cat2) {
            return;
        }
        if enabled {
            self.category_collide_flags[cat1 as usize] |= 1 << cat2;
            self.category_collide_flags[cat2 as usize] |= 1 << cat1;
        } else {
            self.category_collide_flags[cat1 as usize] &= !(1 << cat2);
            self.category_collide_flags[cat2 as usize] &= !(1 << cat1);
        }
    }

    /// Enable or disable collisions of one category against all others.
    pub fn enable_category_collisions_all(&mut self, cat: u32, enabled: bool) {
        if !self.check_matrix_mutable() || !check_category(cat) {
            return;
        }
        for row in &mut self.category_collide_flags {
            if enabled {
                *row |= 1 << cat;
            } else {
                *row &= !(1 << cat);
            }
        }
        self.category_collide_flags[cat as usize] = if enabled { u32::MAX } else { 0 };
    }

    /// The categories the given category collides with.
    pub fn collide_flags(&self, category: u32) -> u32 {
        if !check_category(category) {
            return 0;
        }
        self.category_collide_flags[category as usize]
    }

    /// Set the collision category of a body's non-sensor geoms, re-baking
    /// their collide bits from the matrix.
    pub fn set_collision_category(&mut self, body: BodyId, category: u32) {
        if !check_category(category) {
            return;
        }
        let flags = self.collide_flags(category);
        let geom_ids = self.bodies[body].geoms.clone();
        for id in geom_ids {
            let geom = &mut self.geoms[id];
            if !geom.sensor {
                geom.category = category;
                geom.collide_bits = flags;
            }
        }
    }

    fn check_matrix_mutable(&self) -> bool {
        if !self.bodies.is_empty() {
            log::error!(
                "{}: category matrix mutated after body creation; ignored",
                self.name
            );
            return false;
        }
        true
    }

    // ---------- handlers ----------

    /// Install a collision handler on a geom.
    pub fn set_collision_handler(&mut self, geom: GeomId, handler: CollisionHandler) {
        self.handlers.insert(geom, handler);
    }

    /// Remove a geom's collision handler, if any.
    pub fn clear_collision_handler(&mut self, geom: GeomId) {
        self.handlers.remove(geom);
    }

    /// Install handlers on a body's geoms: on the one named `geom_name`,
    /// or on all of them when `None`. `make` is invoked once per matching
    /// geom. Returns whether any handler was installed.
    pub fn set_body_collision_handlers(
        &mut self,
        body: BodyId,
        geom_name: Option<&str>,
        mut make: impl FnMut() -> CollisionHandler,
    ) -> bool {
        let geom_ids = self.bodies[body].geoms.clone();
        let mut any = false;
        for id in geom_ids {
            if geom_name.map_or(true, |name| self.geoms[id].name == name) {
                self.handlers.insert(id, make());
                any = true;
            }
        }
        any
    }

    /// Remove handlers from a body's geoms, by name or all of them.
    pub fn clear_body_collision_handlers(&mut self, body: BodyId, geom_name: Option<&str>) {
        let geom_ids = self.bodies[body].geoms.clone();
        for id in geom_ids {
            if geom_name.map_or(true, |name| self.geoms[id].name == name) {
                self.handlers.remove(id);
            }
        }
    }

    /// Find a body's geom by name.
    pub fn body_geom(&self, body: BodyId, name: &str) -> Option<GeomId> {
        self.bodies[body]
            .geoms
            .iter()
            .copied()
            .find(|&id| self.geoms[id].name == name)
    }

    // ---------- internals ----------

    /// Turn each continuous geom into a ray covering its body's motion
    /// since the previous frame.
    fn advance_continuous_geoms(&mut self) {
        let ids = self.continuous.clone();
        for id in ids {
            let Some(geom) = self.geoms.get(id) else {
                continue;
            };
            let Some(body_id) = geom.body else {
                continue;
            };
            let cur_pos = self.bodies[body_id].position(&self.world);

            let geom = &mut self.geoms[id];
            let Shape::Continuous(state) = &mut geom.shape else {
                continue;
            };

            if let Some(prev) = state.prev_pos {
                let delta = cur_pos - prev;
                let len = delta.norm();
                if len > 1e-6 {
                    state.origin = prev;
                    state.direction = delta / len;
                    state.length = len;
                    geom.enabled = true;
                }
            }
            state.prev_pos = Some(cur_pos);
        }
    }

    /// Cap runaway velocities component-wise, or damp them when under the
    /// caps.
    fn handle_body_velocities(&mut self) {
        let max_v = self.config.max_velocity_component;
        let max_w = self.config.max_ang_velocity_component;

        for body in self.bodies.values() {
            if body.is_static {
                continue;
            }

            let v = body.lin_vel(&self.world);
            let w = body.local_ang_vel(&self.world);

            let max_comp = v.x.abs().max(v.y.abs()).max(v.z.abs());
            if max_comp > max_v {
                let capped = v / max_comp * max_v;
                self.world.body_mut(body.state).lin_vel = capped;
                log::debug!(
                    "capping linear velocity of {} at {:?}",
                    body.name,
                    body.position(&self.world)
                );
            } else {
                let state = self.world.body(body.state);
                let mut dampening = -self.config.lin_dampening * state.mass.mass * v;
                if state.below_water {
                    dampening *= self.config.water_dampening_factor;
                }
                self.world.body_mut(body.state).force += dampening;
            }

            let max_comp = w.x.abs().max(w.y.abs()).max(w.z.abs());
            if max_comp > max_w {
                let capped = w / max_comp * max_w;
                let world_w = body.frame(&self.world).transform_vector(capped);
                self.world.body_mut(body.state).ang_vel = world_w;
                log::debug!(
                    "capping angular velocity of {} at {:?}",
                    body.name,
                    body.position(&self.world)
                );
            } else {
                let state = self.world.body(body.state);
                let mut torque_local = -self.config.ang_dampening * (state.mass.inertia * w);
                if state.below_water {
                    torque_local *= self.config.water_dampening_factor;
                }
                let world_torque = body.frame(&self.world).transform_vector(torque_local);
                self.world.body_mut(body.state).torque += world_torque;
            }
        }
    }

    /// Log every body with its sleep state and geoms.
    pub fn dump_contents(&self) {
        log::info!("simulator \"{}\":", self.name);
        for body in self.bodies.values() {
            log::info!(
                "  body \"{}\" : sleeping: {}, static: {}, geoms: {}",
                body.name,
                body.is_sleeping(&self.world),
                body.is_static,
                body.geoms.len()
            );
        }
        self.static_space.dump_contents(&self.geom_ctx());
        self.actor_space.dump_contents(&self.geom_ctx());
    }
}

fn check_category(category: u32) -> bool {
    if category >= 32 {
        debug_assert!(false, "category out of range");
        log::error!("collision category {category} out of range");
        return false;
    }
    true
}

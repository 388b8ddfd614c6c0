//! Networked rigid bodies: the target/proxy dual representation
//!
//! The *target* is the authoritative physics body, driven by the server
//! (or local prediction). The *proxy* is a presentation-only body that
//! smoothly chases the target, hiding the jumps of discrete network
//! updates. Sleep transitions, neighbor wake-up, dead reckoning and the
//! wire state encoding all live here.

use bitflags::bitflags;

use crate::body::BodyId;
use crate::collision::SpaceSlot;
use crate::foundation::math::{utils, BodyFrame, Mat4, Vec3};
use crate::foundation::time::{TaskHandle, TaskScheduler};
use crate::simulator::Simulator;

use super::bitstream::{BitReader, BitWriter};
use super::reconcile::{approach_velocity, ReconcilePolicy};

bitflags! {
    /// Independently toggleable wire state groups.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StateGroups: u8 {
        /// Transform and velocities
        const CORE = 1;
        /// Subclass payload (lifetime)
        const EXTRA = 2;
    }
}

/// Whether wire encoding quantizes transforms and velocities. Compile-time
/// so both ends agree by construction.
const fn quantized() -> bool {
    cfg!(feature = "net-quantized")
}

/// Notifications emitted by a networked body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEvent {
    /// The body's pose was overwritten from outside the simulation
    PositionSetExternally,
    /// The initial network state has been applied
    InitialPositionSet,
    /// The target fell asleep
    WentToSleep,
    /// The target woke up
    WokeUp,
    /// The scheduled lifetime ran out; the owner should delete the body
    LifetimeExpired,
}

/// Observer callback for [`BodyEvent`]s.
pub type BodyEventSink = Box<dyn FnMut(BodyEvent)>;

/// Presentation state of a networked body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    /// Static or client-side-only: the target presents itself
    NoProxy,
    /// Proxy exists but is asleep along with the target
    ProxyAsleep,
    /// Proxy is chasing an awake target
    ProxyInterpolating,
}

/// A networked object's physics: authoritative target plus optional
/// interpolated proxy.
///
/// All methods take the owning [`Simulator`]; the body holds only ids.
/// Wire ordering contract: a concrete object writes
/// `{its own init payload, [`NetworkedBody::write_init_values`]}` for
/// creation and `{[`NetworkedBody::write_state`], its own state payload}`
/// for updates, and mirrors that exactly when reading.
pub struct NetworkedBody {
    target: BodyId,
    proxy: Option<BodyId>,
    /// Opaque owner tag: stored as the bodies' user data and used as the
    /// scheduler task tag for lifetime expiry.
    tag: u64,
    client_side_only: bool,
    sleeping_last_frame: bool,
    policy: ReconcilePolicy,
    lifetime_task: Option<TaskHandle>,
    events: Option<BodyEventSink>,
    removal_prepared: bool,
}

impl NetworkedBody {
    /// Wrap a freshly instantiated target body.
    ///
    /// `tag` identifies the owning game object; it becomes the body's user
    /// data so collision events can be routed back.
    pub fn new(sim: &mut Simulator, target: BodyId, tag: u64, client_side_only: bool) -> Self {
        sim.body_mut(target).user_data = Some(tag);
        let policy = ReconcilePolicy::from_config(sim.config());
        Self {
            target,
            proxy: None,
            tag,
            client_side_only,
            sleeping_last_frame: true,
            policy,
            lifetime_task: None,
            events: None,
            removal_prepared: false,
        }
    }

    /// Install an observer for body events.
    pub fn set_event_sink(&mut self, sink: BodyEventSink) {
        self.events = Some(sink);
    }

    /// The authoritative body
    pub fn target(&self) -> BodyId {
        self.target
    }

    /// The presentation body, if one exists
    pub fn proxy(&self) -> Option<BodyId> {
        self.proxy
    }

    /// The owner tag passed at construction
    pub fn tag(&self) -> u64 {
        self.tag
    }

    /// Whether this body would present through a proxy on a client.
    pub fn should_create_proxy(&self, sim: &Simulator) -> bool {
        !sim.body(self.target).is_static && !self.client_side_only
    }

    /// Current presentation state, derived from the target's sleep state.
    pub fn proxy_state(&self, sim: &Simulator) -> ProxyState {
        match self.proxy {
            None => ProxyState::NoProxy,
            Some(_) => {
                let target = sim.body(self.target);
                if !target.is_static && !target.is_sleeping(sim.world()) {
                    ProxyState::ProxyInterpolating
                } else {
                    ProxyState::ProxyAsleep
                }
            }
        }
    }

    /// Create the presentation proxy: a live clone of the target.
    ///
    /// The target stops colliding (its geoms leave all spaces) and loses
    /// gravity, becoming a pure kinematic reference: if updates stop
    /// arriving it must not free-fall and drag the proxy down with it.
    /// Controlled objects re-enable target collision externally for
    /// client-side prediction.
    pub fn create_proxy(&mut self, sim: &mut Simulator) {
        debug_assert!(self.proxy.is_none());
        if sim.body(self.target).is_static {
            debug_assert!(false, "proxy for a static body");
            log::error!("refusing to create proxy for static body {}", sim.body(self.target).name);
            return;
        }

        let proxy = sim.instantiate_clone(self.target);
        {
            let body = sim.body_mut(proxy);
            body.name = format!("{}-proxy", body.name);
            body.user_data = Some(self.tag);
        }
        {
            let (body, world) = sim.body_and_world_mut(proxy);
            body.enable_gravity(world, false);
        }

        sim.remove_from_spaces(self.target);
        let (target, world) = sim.body_and_world_mut(self.target);
        target.enable_gravity(world, false);

        self.proxy = Some(proxy);
    }

    /// Per-tick update: drive the proxy after the target, then re-evaluate
    /// the sleep-transition state machine.
    pub fn frame_move(&mut self, sim: &mut Simulator, _dt: f32) {
        if let Some(proxy) = self.proxy {
            let target = sim.body(self.target);
            if !target.is_static && !target.is_sleeping(sim.world()) {
                if sim.body(proxy).is_sleeping(sim.world()) {
                    // Wake up proxy if target is not asleep.
                    sim.wake_body(proxy);
                }
                self.handle_proxy_interpolation(sim);
            } else {
                // A proxy belonging to a sleeping target stays asleep.
                sim.sleep_body(proxy);
            }
        }

        self.handle_sleeping_state(sim);
    }

    /// Blend the proxy toward the target pose and velocities.
    fn handle_proxy_interpolation(&mut self, sim: &mut Simulator) {
        let Some(proxy_id) = self.proxy else {
            return;
        };

        let world = sim.world();
        let target = sim.body(self.target);
        let proxy = sim.body(proxy_id);

        let target_frame = target.frame(world);
        let mut frame = proxy.frame(world);
        // Position lerp plus a component-wise orientation blend with a
        // re-orthonormalization pass to fix the drift the blend causes.
        frame.blend_toward(&target_frame, self.policy.pos_rate, self.policy.orientation_rate);

        let lin = approach_velocity(
            proxy.lin_vel(world),
            target.lin_vel(world),
            self.policy.vel_rate,
        );
        let ang = approach_velocity(
            proxy.ang_vel(world),
            target.ang_vel(world),
            self.policy.ang_vel_rate,
        );

        let (proxy, world) = sim.body_and_world_mut(proxy_id);
        proxy.set_frame(world, &frame);
        proxy.set_lin_vel(world, lin);
        proxy.set_ang_vel(world, ang);
    }

    /// React to the target's sleep state changing since last frame:
    /// migrate the presentation body between spaces, keep the proxy
    /// consistent, wake touching neighbors, and notify observers.
    pub fn handle_sleeping_state(&mut self, sim: &mut Simulator) {
        if sim.body(self.target).is_static {
            return;
        }

        let sleeping = sim.body(self.target).is_sleeping(sim.world());
        if sleeping && !self.sleeping_last_frame {
            log::debug!("{} has gone to sleep", sim.body(self.target).name);
            self.sleeping_last_frame = true;

            let presentation = self.proxy.unwrap_or(self.target);
            sim.change_space(presentation, SpaceSlot::Actor, SpaceSlot::Static);

            if let Some(proxy) = self.proxy {
                // Snap to the exact target pose before freezing.
                self.warp_proxy(sim, true);
                sim.sleep_body(proxy);
            }

            self.emit(BodyEvent::WentToSleep);
        } else if !sleeping && self.sleeping_last_frame {
            log::debug!("{} is now awake", sim.body(self.target).name);
            self.sleeping_last_frame = false;

            // A body waking inside a resting stack must drag its
            // neighbors along, or they would hang frozen in the air.
            self.wake_neighbors(sim);

            let presentation = self.proxy.unwrap_or(self.target);
            sim.change_space(presentation, SpaceSlot::Static, SpaceSlot::Actor);

            self.emit(BodyEvent::WokeUp);
        }
    }

    /// Wake every sleeping body touching one of the target's geoms, via
    /// one-shot queries against the static space.
    fn wake_neighbors(&mut self, sim: &mut Simulator) {
        let geom_ids = sim.body(self.target).geoms.clone();

        let mut touching: Vec<BodyId> = Vec::new();
        for id in geom_ids {
            sim.collide_geom(SpaceSlot::Static, id, |event| {
                if let Some(other) = event.other_body {
                    touching.push(other);
                }
            });
        }
        touching.sort();
        touching.dedup();

        for body_id in touching {
            let Some(body) = sim.try_body(body_id) else {
                continue;
            };
            if !body.is_static && body.is_sleeping(sim.world()) {
                sim.wake_body(body_id);
            }
        }
    }

    /// Snap the proxy to the target when positional drift exceeds the
    /// policy threshold, or unconditionally when `force` is set.
    pub fn warp_proxy(&mut self, sim: &mut Simulator, force: bool) {
        let Some(proxy_id) = self.proxy else {
            return;
        };

        let world = sim.world();
        let target = sim.body(self.target);
        let proxy = sim.body(proxy_id);

        let dist_sqr = (target.position(world) - proxy.position(world)).norm_squared();
        if !force && dist_sqr <= self.policy.warp_threshold_sqr {
            return;
        }

        let frame = target.frame(world);
        let lin = target.lin_vel(world);
        let ang = target.ang_vel(world);
        let proxy_static = proxy.is_static;

        let (proxy, world) = sim.body_and_world_mut(proxy_id);
        if !proxy_static {
            proxy.set_lin_vel(world, lin);
            proxy.set_ang_vel(world, ang);
        }
        proxy.set_frame(world, &frame);

        log::debug!(
            "{}warping proxy of {} to new position ({dist_sqr})",
            if force { "forced " } else { "" },
            sim.body(self.target).name
        );
    }

    // ---------- sleep / static / pose forwarding ----------

    /// Whether the target is static
    pub fn is_static(&self, sim: &Simulator) -> bool {
        sim.body(self.target).is_static
    }

    /// Whether the target is asleep
    pub fn is_sleeping(&self, sim: &Simulator) -> bool {
        sim.body(self.target).is_sleeping(sim.world())
    }

    /// Change the target's sleep state and run the transition machinery
    /// immediately.
    pub fn set_sleeping(&mut self, sim: &mut Simulator, sleeping: bool) {
        sim.set_sleeping(self.target, sleeping);
        self.handle_sleeping_state(sim);
    }

    /// Change the static flag of target and proxy, keeping sleep state
    /// consistent on both sides of the transition.
    pub fn set_static(&mut self, sim: &mut Simulator, is_static: bool) {
        if is_static == self.is_static(sim) {
            return;
        }

        // The transition machinery only works on non-static bodies, so it
        // runs before going static and after going dynamic.
        if is_static {
            self.set_sleeping(sim, true);
        }

        sim.set_static(self.target, is_static);
        if let Some(proxy) = self.proxy {
            sim.set_static(proxy, is_static);
        }

        if !is_static {
            self.handle_sleeping_state(sim);
        }
    }

    /// Target position
    pub fn position(&self, sim: &Simulator) -> Vec3 {
        sim.body(self.target).position(sim.world())
    }

    /// Warp target (and proxy) to a new position.
    pub fn set_position(&mut self, sim: &mut Simulator, position: Vec3) {
        {
            let (target, world) = sim.body_and_world_mut(self.target);
            target.set_position(world, position);
        }
        sim.update_body_bounds(self.target);
        if let Some(proxy) = self.proxy {
            {
                let (proxy, world) = sim.body_and_world_mut(proxy);
                proxy.set_position(world, position);
            }
            sim.update_body_bounds(proxy);
        }
        self.emit(BodyEvent::PositionSetExternally);
    }

    /// Warp target (and proxy) to a new frame.
    pub fn set_frame(&mut self, sim: &mut Simulator, frame: &BodyFrame) {
        {
            let (target, world) = sim.body_and_world_mut(self.target);
            target.set_frame(world, frame);
        }
        sim.update_body_bounds(self.target);
        if let Some(proxy) = self.proxy {
            {
                let (proxy, world) = sim.body_and_world_mut(proxy);
                proxy.set_frame(world, frame);
            }
            sim.update_body_bounds(proxy);
        }
        self.emit(BodyEvent::PositionSetExternally);
    }

    /// Transform matrix of the target, or of the proxy when `proxy` is set
    /// and one exists (the pose to render).
    pub fn transform(&self, sim: &Simulator, proxy: bool) -> Mat4 {
        let body = match self.proxy {
            Some(p) if proxy => sim.body(p),
            _ => sim.body(self.target),
        };
        body.frame(sim.world()).to_matrix()
    }

    /// Target linear velocity
    pub fn lin_vel(&self, sim: &Simulator) -> Vec3 {
        sim.body(self.target).lin_vel(sim.world())
    }

    /// Target angular velocity
    pub fn ang_vel(&self, sim: &Simulator) -> Vec3 {
        sim.body(self.target).ang_vel(sim.world())
    }

    /// Set the target's linear velocity.
    pub fn set_lin_vel(&mut self, sim: &mut Simulator, v: Vec3) {
        let (target, world) = sim.body_and_world_mut(self.target);
        target.set_lin_vel(world, v);
    }

    /// Set the target's angular velocity.
    pub fn set_ang_vel(&mut self, sim: &mut Simulator, w: Vec3) {
        let (target, world) = sim.body_and_world_mut(self.target);
        target.set_ang_vel(world, w);
    }

    /// Set the collision category of the target's non-sensor geoms, and
    /// the proxy's when `set_proxy` is given.
    pub fn set_collision_category(&mut self, sim: &mut Simulator, category: u32, set_proxy: bool) {
        sim.set_collision_category(self.target, category);
        if set_proxy {
            if let Some(proxy) = self.proxy {
                sim.set_collision_category(proxy, category);
            }
        }
    }

    // ---------- lifetime ----------

    /// Schedule, reschedule, or (with `dt == 0`) cancel the deferred
    /// lifetime-expiry task.
    pub fn set_lifetime(&mut self, scheduler: &mut TaskScheduler, dt: f32) {
        match self.lifetime_task {
            None => {
                if dt == 0.0 {
                    return;
                }
                self.lifetime_task = Some(scheduler.schedule(dt, self.tag));
            }
            Some(handle) => {
                if dt == 0.0 {
                    scheduler.cancel(handle);
                    self.lifetime_task = None;
                } else {
                    scheduler.reschedule(handle, dt);
                }
            }
        }
    }

    /// Remaining lifetime, or 0.0 when none is scheduled.
    pub fn lifetime(&self, scheduler: &TaskScheduler) -> f32 {
        self.lifetime_task
            .and_then(|h| scheduler.remaining(h))
            .unwrap_or(0.0)
    }

    /// To be called by the owner when the scheduler fires this body's tag:
    /// emits [`BodyEvent::LifetimeExpired`], upon which the owner should
    /// request deletion.
    pub fn on_lifetime_expired(&mut self) {
        self.lifetime_task = None;
        self.emit(BodyEvent::LifetimeExpired);
    }

    // ---------- teardown ----------

    /// Detach all geoms from their spaces ahead of destruction.
    ///
    /// This generates the stop events for any live contacts while the
    /// owning object still exists in full, which the destructor proper
    /// could not guarantee. Bodies without a proxy wake themselves first
    /// so resting neighbors are not left frozen mid-air.
    pub fn prepare_removal(&mut self, sim: &mut Simulator) {
        if self.removal_prepared {
            return;
        }
        self.removal_prepared = true;

        if let Some(proxy) = self.proxy {
            for geom in sim.body(proxy).geoms.clone() {
                sim.disable_geom(geom);
                sim.set_geom_space(geom, None);
            }
        } else if self.is_sleeping(sim) && !self.is_static(sim) {
            self.set_sleeping(sim, false);
        }

        for geom in sim.body(self.target).geoms.clone() {
            sim.disable_geom(geom);
            sim.set_geom_space(geom, None);
        }
    }

    /// Tear the body pair down in the required order: spaces first, then
    /// the solver bodies.
    pub fn destroy(mut self, sim: &mut Simulator, scheduler: &mut TaskScheduler) {
        self.set_lifetime(scheduler, 0.0);
        self.prepare_removal(sim);
        if let Some(proxy) = self.proxy.take() {
            sim.destroy_body(proxy);
        }
        sim.destroy_body(self.target);
    }

    // ---------- wire state ----------

    /// Write the core state group: the target transform, plus linear and
    /// angular velocity for dynamic bodies.
    pub fn write_core_state(&self, sim: &Simulator, stream: &mut BitWriter) {
        let world = sim.world();
        let target = sim.body(self.target);

        stream.write_frame(&target.frame(world), quantized());

        if !target.is_static {
            for v in [target.lin_vel(world), target.ang_vel(world)] {
                if quantized() {
                    stream.write_vec3_quantized(v);
                } else {
                    stream.write_vec3(v);
                }
            }
        }
    }

    /// Read the core state group and assign it to the target.
    ///
    /// With a non-zero `timestamp_ms` and a receive clock `now_ms` past
    /// it, the position is dead-reckoned forward over the elapsed time
    /// before assignment. A sleeping target is force-woken when the
    /// incoming velocities are non-zero. Returns false on a short read.
    pub fn read_core_state(
        &mut self,
        sim: &mut Simulator,
        stream: &mut BitReader,
        timestamp_ms: u32,
        now_ms: u32,
    ) -> bool {
        let Some(mut frame) = stream.read_frame(quantized()) else {
            return false;
        };

        if !sim.body(self.target).is_static {
            let read_vec = |stream: &mut BitReader| {
                if quantized() {
                    stream.read_vec3_quantized()
                } else {
                    stream.read_vec3()
                }
            };
            let Some(mut v) = read_vec(stream) else {
                return false;
            };
            let Some(w) = read_vec(stream) else {
                return false;
            };

            // Dead-reckon without gravity for normal objects.
            self.dead_reckon(sim, &mut frame, &mut v, w, false, timestamp_ms, now_ms);

            {
                let (target, world) = sim.body_and_world_mut(self.target);
                target.set_lin_vel(world, v);
                target.set_ang_vel(world, w);
            }

            // Wake up if the state says the body moves. Cannot wake
            // unconditionally: the initial state transmission also runs
            // through here, and resting bodies must stay asleep.
            let moving = v != Vec3::zeros() || w != Vec3::zeros();
            if moving && sim.body(self.target).is_sleeping(sim.world()) {
                sim.wake_body(self.target);
            }
        }

        let (target, world) = sim.body_and_world_mut(self.target);
        target.set_frame(world, &frame);
        true
    }

    /// Forward-integrate a received state over the latency interval.
    ///
    /// A deliberately coarse approximation of the real pipeline: fixed
    /// steps of linear damping (plus gravity if requested) on the
    /// velocity, accumulated into the position, then one finite rotation
    /// for the angular part. Compensates one-way latency; does not try to
    /// be bit-exact with the authoritative simulation.
    pub fn dead_reckon(
        &self,
        sim: &Simulator,
        frame: &mut BodyFrame,
        v: &mut Vec3,
        w: Vec3,
        gravity: bool,
        timestamp_ms: u32,
        now_ms: u32,
    ) {
        if timestamp_ms == 0 || now_ms <= timestamp_ms {
            return;
        }
        let elapsed = (now_ms - timestamp_ms) as f32 * 0.001;

        let config = sim.config();
        let step = 1.0 / config.fps;
        let mut remaining = elapsed;
        while remaining > 0.0 {
            *v -= *v * (step * config.lin_dampening);
            if gravity {
                v.y -= step * config.gravity;
            }
            frame.translation += *v * step;
            remaining -= step;
        }

        let w_abs = w.norm();
        if !utils::equals_zero(w_abs) {
            frame.rotate_about_axis(w, -utils::deg_to_rad(w_abs) * elapsed);
        }
    }

    /// Write the requested state groups in wire order.
    pub fn write_state(&self, sim: &Simulator, stream: &mut BitWriter, groups: StateGroups) {
        if groups.contains(StateGroups::CORE) {
            self.write_core_state(sim, stream);
        }
    }

    /// Read the requested state groups, then re-evaluate proxy drift —
    /// forcing a warp after a full update (one containing the extra
    /// group). Returns false on a short read.
    pub fn read_state(
        &mut self,
        sim: &mut Simulator,
        stream: &mut BitReader,
        groups: StateGroups,
        timestamp_ms: u32,
        now_ms: u32,
    ) -> bool {
        if groups.contains(StateGroups::CORE)
            && !self.read_core_state(sim, stream, timestamp_ms, now_ms)
        {
            return false;
        }

        self.warp_proxy(sim, groups.contains(StateGroups::EXTRA));
        true
    }

    /// Write the object-creation payload: core state plus the remaining
    /// lifetime (delta-coded against "none").
    pub fn write_init_values(
        &self,
        sim: &Simulator,
        scheduler: &TaskScheduler,
        stream: &mut BitWriter,
    ) {
        self.write_state(sim, stream, StateGroups::all());
        stream.write_delta_f32(self.lifetime(scheduler), 0.0);
    }

    /// Read the object-creation payload written by
    /// [`NetworkedBody::write_init_values`]. Returns false on a short
    /// read.
    pub fn read_init_values(
        &mut self,
        sim: &mut Simulator,
        scheduler: &mut TaskScheduler,
        stream: &mut BitReader,
        timestamp_ms: u32,
        now_ms: u32,
    ) -> bool {
        if !self.read_state(sim, stream, StateGroups::all(), timestamp_ms, now_ms) {
            return false;
        }
        let Some(lifetime) = stream.read_delta_f32(0.0) else {
            return false;
        };
        self.set_lifetime(scheduler, lifetime);

        self.emit(BodyEvent::InitialPositionSet);
        true
    }

    fn emit(&mut self, event: BodyEvent) {
        if let Some(sink) = self.events.as_mut() {
            sink(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyBlueprint;
    use crate::collision::{Geom, Material, Shape};
    use crate::config::PhysicsConfig;
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sphere_blueprint(name: &str) -> BodyBlueprint {
        let mut geom = Geom::new(format!("{name}-hull"), Shape::Sphere { radius: 0.5 });
        geom.material = Material {
            friction: 0.8,
            bounciness: 0.1,
            mass: 10.0,
        };
        BodyBlueprint {
            name: name.into(),
            is_static: false,
            cog: Vec3::zeros(),
            geoms: vec![geom],
        }
    }

    fn setup() -> (Simulator, NetworkedBody) {
        let mut sim = Simulator::new("net-test", PhysicsConfig::default());
        let target = sim.instantiate(&sphere_blueprint("drum"));
        let body = NetworkedBody::new(&mut sim, target, 1, false);
        (sim, body)
    }

    #[test]
    fn create_proxy_detaches_target_from_spaces() {
        let (mut sim, mut body) = setup();
        assert_eq!(sim.actor_space().member_count(), 1);

        body.create_proxy(&mut sim);

        // Only the proxy's geom remains collidable.
        assert_eq!(sim.actor_space().member_count(), 1);
        let proxy = body.proxy().unwrap();
        assert!(sim.body(proxy).name.ends_with("-proxy"));
        assert!(!sim.body(proxy).gravity_enabled(sim.world()));
        assert!(!sim.body(body.target()).gravity_enabled(sim.world()));
    }

    #[test]
    fn proxy_position_error_shrinks_geometrically() {
        let (mut sim, mut body) = setup();
        body.create_proxy(&mut sim);
        let proxy = body.proxy().unwrap();
        let rate = sim.config().proxy_interpolation_speed_pos;

        body.set_position(&mut sim, Vec3::zeros());
        // Move only the target; the proxy has to chase it.
        let (target, world) = sim.body_and_world_mut(body.target());
        target.set_position(world, Vec3::new(1.0, 0.0, 0.0));

        let mut error = 1.0f32;
        for _ in 0..5 {
            body.handle_proxy_interpolation(&mut sim);
            let new_error =
                (sim.body(proxy).position(sim.world()) - Vec3::new(1.0, 0.0, 0.0)).norm();
            assert_relative_eq!(new_error, error * (1.0 - rate), epsilon = 1e-4);
            error = new_error;
        }
    }

    #[test]
    fn proxy_velocity_never_exceeds_target_after_blend() {
        let (mut sim, mut body) = setup();
        body.create_proxy(&mut sim);
        let proxy = body.proxy().unwrap();

        body.set_lin_vel(&mut sim, Vec3::new(2.0, 0.0, 0.0));
        {
            let (proxy_body, world) = sim.body_and_world_mut(proxy);
            proxy_body.set_lin_vel(world, Vec3::new(10.0, 0.0, 0.0));
        }

        body.handle_proxy_interpolation(&mut sim);
        let v = sim.body(proxy).lin_vel(sim.world());
        // Faster than the target: snapped, not blended.
        assert_relative_eq!(v, Vec3::new(2.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn dead_reckoning_is_exact_without_damping_and_gravity() {
        let mut config = PhysicsConfig::default();
        config.lin_dampening = 0.0;
        config.fps = 50.0;
        let mut sim = Simulator::new("dr", config);
        let target = sim.instantiate(&sphere_blueprint("drum"));
        let body = NetworkedBody::new(&mut sim, target, 1, false);

        let mut frame = BodyFrame::identity();
        let mut v = Vec3::new(2.0, 0.0, 0.0);

        // 100 ms at 50 fps: exactly 5 steps of 0.02 s.
        body.dead_reckon(&sim, &mut frame, &mut v, Vec3::zeros(), false, 1000, 1100);
        assert_relative_eq!(
            frame.translation,
            Vec3::new(2.0 * 0.1, 0.0, 0.0),
            epsilon = 1e-4
        );
        assert_relative_eq!(v, Vec3::new(2.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn dead_reckoning_skips_stale_or_missing_timestamps() {
        let (sim, body) = setup();
        let mut frame = BodyFrame::identity();
        let mut v = Vec3::new(1.0, 0.0, 0.0);

        body.dead_reckon(&sim, &mut frame, &mut v, Vec3::zeros(), false, 0, 500);
        assert_relative_eq!(frame.translation, Vec3::zeros());

        body.dead_reckon(&sim, &mut frame, &mut v, Vec3::zeros(), false, 800, 500);
        assert_relative_eq!(frame.translation, Vec3::zeros());
    }

    #[test]
    fn core_state_round_trip_moves_receiver_target() {
        let (mut sim_a, mut body_a) = setup();
        body_a.set_position(&mut sim_a, Vec3::new(3.0, 1.0, -2.0));
        body_a.set_lin_vel(&mut sim_a, Vec3::new(1.0, 0.0, 0.0));

        let mut writer = BitWriter::new();
        body_a.write_core_state(&sim_a, &mut writer);
        let bytes = writer.into_bytes();

        let (mut sim_b, mut body_b) = setup();
        let mut reader = BitReader::new(&bytes);
        // No timestamp: no dead reckoning, exact assignment.
        assert!(body_b.read_core_state(&mut sim_b, &mut reader, 0, 0));

        assert_relative_eq!(
            body_b.position(&sim_b),
            Vec3::new(3.0, 1.0, -2.0),
            epsilon = 1e-2
        );
        assert_relative_eq!(
            body_b.lin_vel(&sim_b),
            Vec3::new(1.0, 0.0, 0.0),
            epsilon = 1e-2
        );
    }

    #[test]
    fn incoming_motion_wakes_a_sleeping_target() {
        let (mut sim_a, mut body_a) = setup();
        body_a.set_lin_vel(&mut sim_a, Vec3::new(1.5, 0.0, 0.0));
        let mut writer = BitWriter::new();
        body_a.write_core_state(&sim_a, &mut writer);
        let bytes = writer.into_bytes();

        let (mut sim_b, mut body_b) = setup();
        body_b.set_sleeping(&mut sim_b, true);
        assert!(body_b.is_sleeping(&sim_b));

        let mut reader = BitReader::new(&bytes);
        assert!(body_b.read_core_state(&mut sim_b, &mut reader, 0, 0));
        assert!(!body_b.is_sleeping(&sim_b));
    }

    #[test]
    fn truncated_stream_reports_failure() {
        let (mut sim, mut body) = setup();
        let bytes = [0u8; 3];
        let mut reader = BitReader::new(&bytes);
        assert!(!body.read_core_state(&mut sim, &mut reader, 0, 0));
    }

    #[test]
    fn sleep_transition_emits_events_and_migrates() {
        let (mut sim, mut body) = setup();
        let events: Rc<RefCell<Vec<BodyEvent>>> = Rc::default();
        let sink = events.clone();
        body.set_event_sink(Box::new(move |e| sink.borrow_mut().push(e)));

        // First frame: freshly created bodies report waking up.
        body.frame_move(&mut sim, 1.0 / 60.0);
        assert_eq!(events.borrow().last(), Some(&BodyEvent::WokeUp));

        body.set_sleeping(&mut sim, true);
        assert_eq!(events.borrow().last(), Some(&BodyEvent::WentToSleep));
        assert_eq!(sim.actor_space().member_count(), 0);
        assert_eq!(sim.static_space().member_count(), 1);

        body.set_sleeping(&mut sim, false);
        assert_eq!(events.borrow().last(), Some(&BodyEvent::WokeUp));
        assert_eq!(sim.actor_space().member_count(), 1);
    }

    #[test]
    fn sleeping_target_forces_proxy_asleep() {
        let (mut sim, mut body) = setup();
        body.create_proxy(&mut sim);
        let proxy = body.proxy().unwrap();

        body.frame_move(&mut sim, 1.0 / 60.0);
        assert_eq!(body.proxy_state(&sim), ProxyState::ProxyInterpolating);

        sim.sleep_body(body.target());
        body.frame_move(&mut sim, 1.0 / 60.0);
        assert_eq!(body.proxy_state(&sim), ProxyState::ProxyAsleep);
        assert!(sim.body(proxy).is_sleeping(sim.world()));
    }

    #[test]
    fn warp_only_beyond_threshold() {
        let (mut sim, mut body) = setup();
        body.create_proxy(&mut sim);
        let proxy = body.proxy().unwrap();
        let threshold = sim.config().proxy_warp_threshold;

        // Small drift: no warp.
        let (target, world) = sim.body_and_world_mut(body.target());
        target.set_position(world, Vec3::new((threshold * 0.5).sqrt(), 0.0, 0.0));
        body.warp_proxy(&mut sim, false);
        assert_relative_eq!(sim.body(proxy).position(sim.world()), Vec3::zeros());

        // Beyond threshold: snapped.
        let far = Vec3::new((threshold * 2.0).sqrt(), 0.0, 0.0);
        let (target, world) = sim.body_and_world_mut(body.target());
        target.set_position(world, far);
        body.warp_proxy(&mut sim, false);
        assert_relative_eq!(sim.body(proxy).position(sim.world()), far, epsilon = 1e-5);
    }

    #[test]
    fn lifetime_schedule_cancel_and_expiry() {
        let (_sim, mut body) = setup();
        let mut scheduler = TaskScheduler::new();

        body.set_lifetime(&mut scheduler, 2.0);
        assert_relative_eq!(body.lifetime(&scheduler), 2.0);

        body.set_lifetime(&mut scheduler, 5.0);
        assert_relative_eq!(body.lifetime(&scheduler), 5.0);

        body.set_lifetime(&mut scheduler, 0.0);
        assert_relative_eq!(body.lifetime(&scheduler), 0.0);
        assert!(scheduler.is_empty());

        body.set_lifetime(&mut scheduler, 1.0);
        let fired = scheduler.tick(1.5);
        assert_eq!(fired, vec![body.tag()]);

        let events: Rc<RefCell<Vec<BodyEvent>>> = Rc::default();
        let sink = events.clone();
        body.set_event_sink(Box::new(move |e| sink.borrow_mut().push(e)));
        body.on_lifetime_expired();
        assert_eq!(events.borrow().last(), Some(&BodyEvent::LifetimeExpired));
    }

    #[test]
    fn init_values_round_trip_carries_lifetime() {
        let (mut sim_a, mut body_a) = setup();
        let mut scheduler_a = TaskScheduler::new();
        body_a.set_lifetime(&mut scheduler_a, 7.5);
        body_a.set_position(&mut sim_a, Vec3::new(0.0, 4.0, 0.0));

        let mut writer = BitWriter::new();
        body_a.write_init_values(&sim_a, &scheduler_a, &mut writer);
        let bytes = writer.into_bytes();

        let (mut sim_b, mut body_b) = setup();
        let mut scheduler_b = TaskScheduler::new();
        let mut reader = BitReader::new(&bytes);
        assert!(body_b.read_init_values(&mut sim_b, &mut scheduler_b, &mut reader, 0, 0));
        assert_relative_eq!(body_b.lifetime(&scheduler_b), 7.5);
        assert_relative_eq!(body_b.position(&sim_b).y, 4.0, epsilon = 1e-2);
    }

    #[test]
    fn destroy_removes_both_bodies() {
        let (mut sim, mut body) = setup();
        body.create_proxy(&mut sim);
        let mut scheduler = TaskScheduler::new();
        body.set_lifetime(&mut scheduler, 3.0);

        body.destroy(&mut sim, &mut scheduler);
        assert!(sim.is_empty());
        assert!(scheduler.is_empty());
        assert_eq!(sim.actor_space().member_count(), 0);
        assert_eq!(sim.static_space().member_count(), 0);
    }
}

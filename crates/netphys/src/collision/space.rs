//! Collision spaces: broad phase, deferred narrow phase and the
//! start/in-progress/stop event lifecycle
//!
//! The phases are an explicit two-step API: [`CollisionSpace::broad_phase`]
//! returns a transient [`PairBatch`], and [`CollisionSpace::narrow_phase`]
//! consumes it. [`CollisionSpace::collide`] chains the two and additionally
//! diffs the frame's pair sets to emit stop events. Because both steps
//! borrow the space mutably, nesting a full-space collide inside another is
//! rejected at compile time; single-geom queries carry their own candidate
//! buffers and may nest freely.

use std::collections::HashSet;

use slotmap::{SecondaryMap, SlotMap};

use crate::body::{BodyId, RigidBody};
use crate::dynamics::{ContactGroup, ContactJoint, World};
use crate::foundation::math::{BodyFrame, Vec3};

use super::aabb::Aabb;
use super::event::{CollisionEvent, CollisionEventKind, CollisionHandler, ContactGeneration};
use super::geom::{Geom, GeomId};
use super::material::Material;
use super::primitives::{self, Contact, Ray};
use super::quadtree::Quadtree;

/// Upper bound on raw contacts generated per geom pair.
pub const MAX_CONTACTS: usize = 20;

/// Squared distance below which two contacts are merged into one.
const CONTACT_MERGE_THRESHOLD: f32 = 0.05 * 0.05;

/// Advance applied past each hit when enumerating all intersections of a
/// ray, so the recast does not report the same surface again.
const RAY_OFFSET: f32 = 1e-3;

/// Contact-buffer saturation is reported at most this often per space.
const SATURATION_WARN_LIMIT: u32 = 10;

/// Read-only view of the world needed to pose geoms during queries.
pub struct GeomContext<'a> {
    /// All geoms
    pub geoms: &'a SlotMap<GeomId, Geom>,
    /// All live bodies
    pub bodies: &'a SlotMap<BodyId, RigidBody>,
    /// The dynamics world holding body states
    pub world: &'a World,
}

impl<'a> GeomContext<'a> {
    /// World pose of a geom, combining its owning body's frame if present.
    pub fn pose(&self, id: GeomId) -> BodyFrame {
        let geom = &self.geoms[id];
        let body_frame = geom
            .body
            .and_then(|b| self.bodies.get(b))
            .map(|b| b.frame(self.world));
        geom.world_pose(body_frame.as_ref())
    }

    /// World bounds of a geom.
    pub fn aabb(&self, id: GeomId) -> Aabb {
        let geom = &self.geoms[id];
        geom.shape.aabb(&self.pose(id))
    }

    fn body_of(&self, id: GeomId) -> Option<&RigidBody> {
        self.geoms[id].body.and_then(|b| self.bodies.get(b))
    }

    fn is_static(&self, id: GeomId) -> bool {
        self.body_of(id).map_or(true, |b| b.is_static)
    }

    fn is_sleeping_or_static(&self, id: GeomId) -> bool {
        self.body_of(id).map_or(true, |b| b.is_sleeping(self.world))
    }
}

/// Mutable context for the narrow phase: handlers get called and contact
/// joints get created.
pub struct NarrowContext<'a> {
    /// All geoms
    pub geoms: &'a SlotMap<GeomId, Geom>,
    /// All live bodies
    pub bodies: &'a SlotMap<BodyId, RigidBody>,
    /// The dynamics world holding body states
    pub world: &'a World,
    /// Installed collision handlers
    pub handlers: &'a mut SecondaryMap<GeomId, CollisionHandler>,
    /// The step's contact joint group
    pub contacts: &'a mut ContactGroup,
}

impl<'a> NarrowContext<'a> {
    fn read(&self) -> GeomContext<'_> {
        GeomContext {
            geoms: self.geoms,
            bodies: self.bodies,
            world: self.world,
        }
    }
}

/// Transient list of potentially colliding pairs from one broad phase.
#[derive(Debug, Default)]
pub struct PairBatch {
    pairs: Vec<(GeomId, GeomId)>,
}

impl PairBatch {
    /// Number of candidate pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

enum Broadphase {
    /// Flat list; fine for the modest actor counts of a match
    List(Vec<GeomId>),
    /// Quadtree for static-geometry-heavy spaces
    Quadtree(Quadtree),
}

/// A collision space: a set of geoms plus the pair bookkeeping needed to
/// report collision lifecycle events.
pub struct CollisionSpace {
    name: String,
    /// Whether start/stop events are tracked. When off, every collision is
    /// reported as in-progress, which is cheaper for space-vs-space passes.
    track_lifecycle: bool,
    broadphase: Broadphase,
    cur_pairs: HashSet<(GeomId, GeomId)>,
    prev_pairs: HashSet<(GeomId, GeomId)>,
    /// Geoms disabled since the last collide; pending pairs referencing
    /// them are skipped.
    disabled_this_pass: Vec<GeomId>,
    saturation_warnings: u32,
}

impl CollisionSpace {
    /// Create a space.
    ///
    /// With `track_lifecycle` false only in-progress events are generated;
    /// geoms about to be deleted must still be detached via
    /// [`CollisionSpace::disable_geom`] first so no stale pairs survive.
    pub fn new(name: impl Into<String>, track_lifecycle: bool) -> Self {
        Self {
            name: name.into(),
            track_lifecycle,
            broadphase: Broadphase::List(Vec::new()),
            cur_pairs: HashSet::new(),
            prev_pairs: HashSet::new(),
            disabled_this_pass: Vec::new(),
            saturation_warnings: 0,
        }
    }

    /// Name of this space for diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the backing structure with a quadtree. The space must be
    /// empty; otherwise the call is logged and ignored.
    pub fn make_quadtree(&mut self, center: Vec3, extents: Vec3, depth: u32) {
        if self.member_count() != 0 {
            log::error!("space {}: make_quadtree on a non-empty space; ignored", self.name);
            return;
        }
        self.broadphase = Broadphase::Quadtree(Quadtree::new(center, extents, depth));
    }

    /// Number of member geoms
    pub fn member_count(&self) -> usize {
        match &self.broadphase {
            Broadphase::List(list) => list.len(),
            Broadphase::Quadtree(tree) => tree.len(),
        }
    }

    /// Add a geom to this space.
    pub fn add_geom(&mut self, id: GeomId, aabb: Aabb) {
        match &mut self.broadphase {
            Broadphase::List(list) => list.push(id),
            Broadphase::Quadtree(tree) => tree.insert(id, aabb),
        }
    }

    /// Remove a geom from the broad phase only. Stop-event bookkeeping is
    /// handled by [`CollisionSpace::disable_geom`], which must run first if
    /// the geom may still have tracked pairs.
    pub fn remove_geom(&mut self, id: GeomId) {
        match &mut self.broadphase {
            Broadphase::List(list) => {
                if let Some(index) = list.iter().position(|&g| g == id) {
                    list.swap_remove(index);
                }
            }
            Broadphase::Quadtree(tree) => tree.remove(id),
        }
    }

    /// Refresh a geom's bounds in the broad phase.
    pub fn update_geom(&mut self, id: GeomId, aabb: Aabb) {
        if let Broadphase::Quadtree(tree) = &mut self.broadphase {
            tree.update(id, aabb);
        }
    }

    /// Whether the geom is a member of this space's broad phase.
    pub fn contains(&self, id: GeomId) -> bool {
        match &self.broadphase {
            Broadphase::List(list) => list.contains(&id),
            Broadphase::Quadtree(tree) => tree.entries().iter().any(|(g, _)| *g == id),
        }
    }

    fn candidates_for(&self, aabb: &Aabb, ctx: &GeomContext, out: &mut Vec<GeomId>) {
        match &self.broadphase {
            Broadphase::List(list) => {
                for &id in list {
                    if ctx.geoms.contains_key(id) && ctx.aabb(id).intersects(aabb) {
                        out.push(id);
                    }
                }
            }
            Broadphase::Quadtree(tree) => tree.query(aabb, out),
        }
    }

    fn member_aabbs(&self, ctx: &GeomContext) -> Vec<(GeomId, Aabb)> {
        match &self.broadphase {
            Broadphase::List(list) => list
                .iter()
                .filter(|id| ctx.geoms.contains_key(**id))
                .map(|&id| (id, ctx.aabb(id)))
                .collect(),
            Broadphase::Quadtree(tree) => tree.entries(),
        }
    }

    fn pair_accepted(ctx: &GeomContext, a: GeomId, b: GeomId) -> bool {
        let (Some(geom_a), Some(geom_b)) = (ctx.geoms.get(a), ctx.geoms.get(b)) else {
            return false;
        };
        geom_a.enabled && geom_b.enabled && geom_a.categories_collide(geom_b)
    }

    /// Broad phase: collect potentially colliding pairs of this space with
    /// itself, or with `other` if given. Category filtering and enabled
    /// flags are applied here; exact tests are deferred to the narrow
    /// phase so the world may be mutated in between.
    ///
    /// Opening a new batch resets the disabled-geom skip list: disables
    /// before this point are already reflected in space membership and
    /// enabled flags, the list only covers disables that race an
    /// outstanding batch.
    pub fn broad_phase(&mut self, ctx: &GeomContext, other: Option<&CollisionSpace>) -> PairBatch {
        self.disabled_this_pass.clear();
        let mut batch = PairBatch::default();

        match other {
            Some(other_space) => {
                let mut candidates = Vec::new();
                for (id, aabb) in self.member_aabbs(ctx) {
                    candidates.clear();
                    other_space.candidates_for(&aabb, ctx, &mut candidates);
                    for &other_id in &candidates {
                        if Self::pair_accepted(ctx, id, other_id) {
                            batch.pairs.push((id, other_id));
                        }
                    }
                }
            }
            None => {
                let members = self.member_aabbs(ctx);
                for (i, (id_a, aabb_a)) in members.iter().enumerate() {
                    for (id_b, aabb_b) in members.iter().skip(i + 1) {
                        if aabb_a.intersects(aabb_b) && Self::pair_accepted(ctx, *id_a, *id_b) {
                            batch.pairs.push((*id_a, *id_b));
                        }
                    }
                }
            }
        }

        batch
    }

    /// Full collide pass: broad phase, narrow phase, and (when lifecycle
    /// tracking is on) stop-event generation for pairs that disappeared.
    ///
    /// `track` can disable lifecycle bookkeeping for this pass only; the
    /// space-vs-space pass of the frame pipeline uses this since static
    /// pairs rarely need start/stop granularity.
    pub fn collide(&mut self, ctx: &mut NarrowContext, other: Option<&CollisionSpace>, track: bool) {
        let batch = self.broad_phase(&ctx.read(), other);
        let track = track && self.track_lifecycle;
        self.narrow_phase_tracked(batch, ctx, track);

        if track {
            self.check_for_stopped_collisions(ctx);
        }

        self.disabled_this_pass.clear();
    }

    /// Narrow phase over a batch of candidate pairs, with this space's
    /// configured lifecycle tracking.
    pub fn narrow_phase(&mut self, batch: PairBatch, ctx: &mut NarrowContext) {
        let track = self.track_lifecycle;
        self.narrow_phase_tracked(batch, ctx, track);
    }

    fn narrow_phase_tracked(&mut self, batch: PairBatch, ctx: &mut NarrowContext, track: bool) {
        let mut contacts: Vec<Contact> = Vec::with_capacity(MAX_CONTACTS);

        for (id_a, id_b) in batch.pairs {
            // The pair may reference geoms disabled since the broad phase.
            if self.disabled_this_pass.contains(&id_a)
                || self.disabled_this_pass.contains(&id_b)
            {
                continue;
            }

            let (Some(geom_a), Some(geom_b)) = (ctx.geoms.get(id_a), ctx.geoms.get(id_b)) else {
                continue;
            };

            // Geoms detached onto the same body never collide.
            let read = ctx.read();
            let body_a = geom_a.body;
            let body_b = geom_b.body;
            if body_a.is_some() && body_a == body_b {
                continue;
            }

            // Sleeping non-sensor pairs are pure cost.
            if !(geom_a.sensor || geom_b.sensor)
                && read.is_sleeping_or_static(id_a)
                && read.is_sleeping_or_static(id_b)
            {
                continue;
            }

            let pose_a = read.pose(id_a);
            let pose_b = read.pose(id_b);
            contacts.clear();
            let count = primitives::collide_shapes(
                &geom_a.shape,
                &pose_a,
                &geom_b.shape,
                &pose_b,
                &mut contacts,
                MAX_CONTACTS,
            );
            if count == 0 {
                continue;
            }
            if count == MAX_CONTACTS && self.saturation_warnings < SATURATION_WARN_LIMIT {
                self.saturation_warnings += 1;
                log::debug!(
                    "space {}: contact buffer saturated ({MAX_CONTACTS}) for {} vs {}",
                    self.name,
                    geom_a.name,
                    geom_b.name
                );
            }

            // Deepest contact represents the pair. Ray "penetrations" are
            // distances from the origin, so the comparison inverts.
            let ray = geom_a.shape.is_ray_like() || geom_b.shape.is_ray_like();
            let deepest = contacts
                .iter()
                .enumerate()
                .max_by(|(_, x), (_, y)| {
                    let ord = x.depth.total_cmp(&y.depth);
                    if ray {
                        ord.reverse()
                    } else {
                        ord
                    }
                })
                .map(|(i, _)| i)
                .unwrap_or(0);

            let vote = self.handle_collision_event(ctx, id_a, id_b, &contacts[deepest], track);
            if !vote.any() || ray {
                continue;
            }

            merge_contacts(&mut contacts);

            let geom_a = &ctx.geoms[id_a];
            let geom_b = &ctx.geoms[id_b];
            let friction = Material::combined_friction(&geom_a.material, &geom_b.material);
            let bounce = Material::combined_bounciness(&geom_a.material, &geom_b.material);

            let solver_key = |body: Option<BodyId>, attach: bool| {
                if !attach {
                    return None;
                }
                body.and_then(|b| ctx.bodies.get(b))
                    .filter(|b| !b.is_static)
                    .map(|b| b.state)
            };
            let attach_a = matches!(vote, ContactGeneration::Both | ContactGeneration::First);
            let attach_b = matches!(vote, ContactGeneration::Both | ContactGeneration::Second);

            for contact in &contacts {
                ctx.contacts.add(ContactJoint {
                    body_a: solver_key(body_a, attach_a),
                    body_b: solver_key(body_b, attach_b),
                    position: contact.position,
                    normal: contact.normal,
                    depth: contact.depth,
                    friction,
                    bounce,
                });
            }
        }

        self.disabled_this_pass.clear();
    }

    /// Record the pair in the current frame's colliding set.
    ///
    /// Returns whether this is a new collision, i.e. the pair was not in
    /// the previous frame's set.
    fn add_colliding_pair(&mut self, mut a: GeomId, mut b: GeomId) -> bool {
        debug_assert!(self.track_lifecycle);
        if a > b {
            std::mem::swap(&mut a, &mut b);
        }

        // A pair colliding twice in one frame indicates broken broad-phase
        // bookkeeping upstream.
        if !self.cur_pairs.insert((a, b)) {
            log::error!(
                "space {}: pair {a:?}/{b:?} registered as colliding twice in one frame",
                self.name
            );
        }

        !self.prev_pairs.contains(&(a, b))
    }

    /// Dispatch the collision to both geoms' handlers and combine their
    /// votes on joint generation.
    fn handle_collision_event(
        &mut self,
        ctx: &mut NarrowContext,
        id_a: GeomId,
        id_b: GeomId,
        contact: &Contact,
        track: bool,
    ) -> ContactGeneration {
        let read = ctx.read();
        let geom_a = &ctx.geoms[id_a];
        let geom_b = &ctx.geoms[id_b];

        if read.is_static(id_a) && read.is_static(id_b) && !geom_a.sensor && !geom_b.sensor {
            // Static non-sensor pairs just waste the solver's time; the
            // categories should have been configured to exclude them.
            log::warn!(
                "space {}: colliding static geoms {} and {} with categories {} and {}",
                self.name,
                geom_a.name,
                geom_b.name,
                geom_a.category,
                geom_b.category
            );
            return ContactGeneration::None;
        }

        let has_a = ctx.handlers.contains_key(id_a);
        let has_b = ctx.handlers.contains_key(id_b);

        // With no handlers installed, sensors default to no collision.
        if !has_a && !has_b {
            return ContactGeneration::from_bool(!(geom_a.sensor || geom_b.sensor));
        }

        let new_collision = track && self.add_colliding_pair(id_a, id_b);
        let kind = if new_collision {
            CollisionEventKind::Start
        } else {
            CollisionEventKind::InProgress
        };

        let body_a = geom_a.body;
        let body_b = geom_b.body;
        let event = CollisionEvent {
            this_geom: id_a,
            other_geom: id_b,
            this_body: body_a,
            other_body: body_b,
            position: contact.position,
            normal: contact.normal,
            penetration: contact.depth,
            kind,
        };

        let mut vote = ContactGeneration::Both;
        if let Some(handler) = ctx.handlers.get_mut(id_a) {
            vote = handler(&event);
        }

        if let Some(handler) = ctx.handlers.get_mut(id_b) {
            let mirrored = CollisionEvent {
                this_geom: id_b,
                other_geom: id_a,
                this_body: body_b,
                other_body: body_a,
                normal: -event.normal,
                ..event
            };
            // The second handler votes in its own frame; mirror back.
            let vote_b = match handler(&mirrored) {
                ContactGeneration::First => ContactGeneration::Second,
                ContactGeneration::Second => ContactGeneration::First,
                other => other,
            };

            if has_a && vote_b != vote {
                log::debug!(
                    "space {}: conflicting contact votes for {} and {}; ignoring collision",
                    self.name,
                    ctx.geoms[id_a].name,
                    ctx.geoms[id_b].name
                );
                vote = ContactGeneration::None;
            } else if !has_a {
                vote = vote_b;
            }
        }

        vote
    }

    /// Deliver a stop event to both geoms' handlers.
    fn generate_stopped_event(ctx: &mut NarrowContext, a: GeomId, b: GeomId) {
        if !ctx.handlers.contains_key(a) && !ctx.handlers.contains_key(b) {
            return;
        }
        let body_a = ctx.geoms.get(a).and_then(|g| g.body);
        let body_b = ctx.geoms.get(b).and_then(|g| g.body);

        let event = CollisionEvent {
            this_geom: a,
            other_geom: b,
            this_body: body_a,
            other_body: body_b,
            position: Vec3::zeros(),
            normal: Vec3::zeros(),
            penetration: 0.0,
            kind: CollisionEventKind::Stop,
        };

        if let Some(handler) = ctx.handlers.get_mut(a) {
            handler(&event);
        }
        if let Some(handler) = ctx.handlers.get_mut(b) {
            let mirrored = CollisionEvent {
                this_geom: b,
                other_geom: a,
                this_body: body_b,
                other_body: body_a,
                ..event
            };
            handler(&mirrored);
        }
    }

    /// Emit stop events for pairs that collided last frame but not this
    /// one, then rotate the pair sets.
    fn check_for_stopped_collisions(&mut self, ctx: &mut NarrowContext) {
        debug_assert!(self.track_lifecycle);

        let stopped: Vec<(GeomId, GeomId)> = self
            .prev_pairs
            .difference(&self.cur_pairs)
            .copied()
            .collect();
        for (a, b) in stopped {
            Self::generate_stopped_event(ctx, a, b);
        }

        std::mem::swap(&mut self.cur_pairs, &mut self.prev_pairs);
        self.cur_pairs.clear();
    }

    /// Synthesize the stop event for a geom that is about to go away.
    ///
    /// Must be called before destroying a geom's body whenever the geom may
    /// still be tracked in a pair set; the natural stop event can no longer
    /// be generated afterwards. Also records the geom so any pending pairs
    /// from an in-flight batch are skipped.
    pub fn disable_geom(&mut self, id: GeomId, ctx: &mut NarrowContext) {
        // Disabling is idempotent: teardown paths disable once explicitly
        // and once more when the geom leaves its space.
        if self.disabled_this_pass.contains(&id) {
            return;
        }
        self.disabled_this_pass.push(id);

        if !self.track_lifecycle {
            return;
        }

        // One stop event suffices even if the geom appears in both sets.
        let mut stop_generated = false;
        for set in [&mut self.prev_pairs, &mut self.cur_pairs] {
            let affected: Vec<(GeomId, GeomId)> = set
                .iter()
                .filter(|(a, b)| *a == id || *b == id)
                .copied()
                .collect();
            for pair in affected {
                set.remove(&pair);
                if !stop_generated {
                    Self::generate_stopped_event(ctx, pair.0, pair.1);
                    stop_generated = true;
                }
            }
        }
    }

    /// One-shot query of a single geom against this space.
    ///
    /// Events carry [`CollisionEventKind::Single`] and no pair state is
    /// touched, so the contained geoms never observe the query. The queried
    /// geom does not need to be a member of this space.
    pub fn collide_geom(
        &self,
        geom: GeomId,
        ctx: &GeomContext,
        mut callback: impl FnMut(&CollisionEvent),
    ) {
        let Some(query_geom) = ctx.geoms.get(geom) else {
            log::error!("space {}: collide_geom with unknown geom", self.name);
            return;
        };

        let pose = ctx.pose(geom);
        let aabb = query_geom.shape.aabb(&pose);
        let mut candidates = Vec::new();
        self.candidates_for(&aabb, ctx, &mut candidates);

        let mut contacts: Vec<Contact> = Vec::with_capacity(1);
        for other in candidates {
            if other == geom {
                continue;
            }
            let Some(other_geom) = ctx.geoms.get(other) else {
                continue;
            };
            if !other_geom.enabled {
                continue;
            }

            contacts.clear();
            if primitives::collide_shapes(
                &query_geom.shape,
                &pose,
                &other_geom.shape,
                &ctx.pose(other),
                &mut contacts,
                1,
            ) == 0
            {
                continue;
            }

            let event = CollisionEvent {
                this_geom: geom,
                other_geom: other,
                this_body: query_geom.body,
                other_body: other_geom.body,
                position: contacts[0].position,
                normal: contacts[0].normal,
                penetration: contacts[0].depth,
                kind: CollisionEventKind::Single,
            };
            callback(&event);
        }
    }

    /// Enumerate all intersection points of a ray geom with this space, in
    /// order of distance from the ray origin.
    ///
    /// Each candidate is re-cast with the origin advanced past the previous
    /// hit; the reported penetration is corrected back to a distance from
    /// the original origin. Heightfield candidates yield only their first
    /// hit.
    pub fn collide_ray_multiple(
        &self,
        ray_geom: GeomId,
        ctx: &GeomContext,
        mut callback: impl FnMut(&CollisionEvent),
    ) {
        let Some(query_geom) = ctx.geoms.get(ray_geom) else {
            log::error!("space {}: collide_ray_multiple with unknown geom", self.name);
            return;
        };
        let pose = ctx.pose(ray_geom);
        let Some((base_ray, base_length)) = primitives::ray_of(&query_geom.shape, &pose) else {
            log::error!(
                "space {}: collide_ray_multiple on non-ray geom {}",
                self.name,
                query_geom.name
            );
            return;
        };

        let aabb = query_geom.shape.aabb(&pose);
        let mut candidates = Vec::new();
        self.candidates_for(&aabb, ctx, &mut candidates);

        let mut hits: Vec<CollisionEvent> = Vec::new();
        for other in candidates {
            if other == ray_geom {
                continue;
            }
            let Some(other_geom) = ctx.geoms.get(other) else {
                continue;
            };
            if !other_geom.enabled {
                continue;
            }
            let other_pose = ctx.pose(other);

            // Walk along the ray collecting every intersection with this
            // candidate, advancing the origin a little past each hit.
            let mut ray = base_ray;
            let mut remaining = base_length;
            let mut penetration_offset = 0.0;
            while let Some(contact) =
                primitives::raycast_shape(&ray, remaining, &other_geom.shape, &other_pose)
            {
                hits.push(CollisionEvent {
                    this_geom: ray_geom,
                    other_geom: other,
                    this_body: query_geom.body,
                    other_body: other_geom.body,
                    position: contact.position,
                    normal: contact.normal,
                    penetration: contact.depth + penetration_offset,
                    kind: CollisionEventKind::Single,
                });

                let advance = contact.depth + RAY_OFFSET;
                if advance >= remaining {
                    break;
                }
                remaining -= advance;
                ray = Ray {
                    origin: contact.position + base_ray.direction * RAY_OFFSET,
                    direction: base_ray.direction,
                };
                penetration_offset += advance;

                if matches!(other_geom.shape, super::shape::Shape::Heightfield(_)) {
                    break;
                }
            }
        }

        hits.sort_by(|a, b| a.penetration.total_cmp(&b.penetration));
        for hit in &hits {
            callback(hit);
        }
    }

    /// Log every member geom with its attributes.
    pub fn dump_contents(&self, ctx: &GeomContext) {
        log::info!("collision space \"{}\":", self.name);
        for (id, _) in self.member_aabbs(ctx) {
            let geom = &ctx.geoms[id];
            let body_name = ctx
                .body_of(id)
                .map_or_else(|| "<none>".to_string(), |b| b.name.clone());
            log::info!(
                "  \"{}\" : {} category {} sensor {} body {}",
                geom.name,
                geom.shape.kind_name(),
                geom.category,
                geom.sensor,
                body_name
            );
        }
    }
}

/// Merge contacts closer than the merge threshold by averaging position,
/// normal and depth and renormalizing the normal. Contacts folded into a
/// neighbor are removed.
pub fn merge_contacts(contacts: &mut Vec<Contact>) {
    let mut merged: Vec<Contact> = Vec::with_capacity(contacts.len());
    let mut used = vec![false; contacts.len()];

    for i in 0..contacts.len() {
        if used[i] {
            continue;
        }

        let mut acc = contacts[i];
        let mut count = 1u32;
        for j in (i + 1)..contacts.len() {
            if used[j] {
                continue;
            }
            let dist_sq = (contacts[i].position - contacts[j].position).norm_squared();
            if dist_sq < CONTACT_MERGE_THRESHOLD {
                used[j] = true;
                acc.position += contacts[j].position;
                acc.normal += contacts[j].normal;
                acc.depth += contacts[j].depth;
                count += 1;
            }
        }

        if count > 1 {
            let inv = 1.0 / count as f32;
            acc.position *= inv;
            acc.depth *= inv;

            let len_sq = acc.normal.norm_squared();
            if len_sq < 1e-12 {
                // Opposing normals cancelled out; drop the cluster.
                continue;
            }
            acc.normal /= len_sq.sqrt();
        }

        merged.push(acc);
    }

    *contacts = merged;
}

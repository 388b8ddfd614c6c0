//! Collision lifecycle scenario: start, in-progress and stop events for a
//! pair of overlapping dynamic geoms, including synthesized stop events
//! for geoms that are torn down.

use std::cell::RefCell;
use std::rc::Rc;

use netphys::collision::{CollisionEventKind, ContactGeneration, Geom, GeomId};
use netphys::prelude::*;

#[derive(Debug, Clone, Copy)]
struct Recorded {
    this_geom: GeomId,
    kind: CollisionEventKind,
    normal: Vec3,
    penetration: f32,
}

type Log = Rc<RefCell<Vec<Recorded>>>;

fn overlapping_pair(sim: &mut Simulator) -> (BodyId, BodyId, Log) {
    let blueprint = |name: &str| {
        let mut geom = Geom::new(format!("{name}-hull"), Shape::Sphere { radius: 0.5 });
        geom.material = Material {
            friction: 1.0,
            bounciness: 0.0,
            mass: 5.0,
        };
        BodyBlueprint {
            name: name.into(),
            is_static: false,
            cog: Vec3::zeros(),
            geoms: vec![geom],
        }
    };

    let a = sim.instantiate(&blueprint("left"));
    let b = sim.instantiate(&blueprint("right"));

    // Overlap by 0.2 along X, no gravity so nothing moves on its own.
    for (id, x) in [(a, 0.0f32), (b, 0.8f32)] {
        let (body, world) = sim.body_and_world_mut(id);
        body.set_position(world, Vec3::new(x, 0.0, 0.0));
        body.enable_gravity(world, false);
        let state = body.state;
        world.body_mut(state).auto_disable = false;
    }

    let log: Log = Rc::default();
    for id in [a, b] {
        let geom = sim.body(id).geoms[0];
        let sink = log.clone();
        // Observe events but vote against contact joints, so the pair
        // stays exactly where it is between frames.
        sim.set_collision_handler(
            geom,
            Box::new(move |event| {
                sink.borrow_mut().push(Recorded {
                    this_geom: event.this_geom,
                    kind: event.kind,
                    normal: event.normal,
                    penetration: event.penetration,
                });
                ContactGeneration::None
            }),
        );
    }

    (a, b, log)
}

#[test]
fn start_then_in_progress_then_stop() {
    let mut sim = Simulator::new("lifecycle", PhysicsConfig::default());
    let (a, _b, log) = overlapping_pair(&mut sim);
    let geom_a = sim.body(a).geoms[0];
    let dt = 1.0 / 60.0;

    // Frame 1: exactly one start event per side, opposite normals, equal
    // penetration.
    sim.frame_move(dt);
    {
        let events = log.borrow();
        let starts: Vec<&Recorded> = events
            .iter()
            .filter(|e| e.kind == CollisionEventKind::Start)
            .collect();
        assert_eq!(starts.len(), 2);
        assert_eq!(events.len(), 2);
        assert!((starts[0].normal + starts[1].normal).norm() < 1e-4);
        assert!((starts[0].penetration - starts[1].penetration).abs() < 1e-4);
        assert!((starts[0].penetration - 0.2).abs() < 1e-3);
    }
    log.borrow_mut().clear();

    // Frame 2: nothing moved, the same pair reports in-progress.
    sim.frame_move(dt);
    {
        let events = log.borrow();
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|e| e.kind == CollisionEventKind::InProgress));
    }
    log.borrow_mut().clear();

    // Tearing the geom down synthesizes exactly one stop event (per
    // side), and the next frame generates nothing referencing it.
    sim.disable_geom(geom_a);
    {
        let events = log.borrow();
        let stops: Vec<&Recorded> = events
            .iter()
            .filter(|e| e.kind == CollisionEventKind::Stop)
            .collect();
        assert_eq!(stops.len(), 2);
        assert_eq!(events.len(), 2);
    }
    log.borrow_mut().clear();

    sim.frame_move(dt);
    assert!(
        log.borrow().iter().all(|e| e.this_geom != geom_a),
        "disabled geom must not appear in further events"
    );
}

#[test]
fn contact_joints_separate_bodies_without_handlers() {
    // Without handlers the same overlap generates joints and the solver
    // pushes the spheres apart.
    let mut sim = Simulator::new("separation", PhysicsConfig::default());
    let blueprint = BodyBlueprint {
        name: "ball".into(),
        is_static: false,
        cog: Vec3::zeros(),
        geoms: vec![{
            let mut g = Geom::new("hull", Shape::Sphere { radius: 0.5 });
            g.material.mass = 5.0;
            g
        }],
    };

    let a = sim.instantiate(&blueprint);
    let b = sim.instantiate(&blueprint);
    for (id, x) in [(a, 0.0f32), (b, 0.8f32)] {
        let (body, world) = sim.body_and_world_mut(id);
        body.set_position(world, Vec3::new(x, 0.0, 0.0));
        body.enable_gravity(world, false);
    }

    for _ in 0..60 {
        sim.frame_move(1.0 / 60.0);
    }

    let distance =
        (sim.body(a).position(sim.world()) - sim.body(b).position(sim.world())).norm();
    assert!(
        distance > 0.8,
        "contact resolution should push the spheres apart (distance {distance})"
    );
}

#[test]
fn category_filtering_suppresses_pair() {
    let mut sim = Simulator::new("categories", PhysicsConfig::default());
    sim.enable_category_collisions(1, 2, false);

    let (a, b, log) = overlapping_pair(&mut sim);
    sim.set_collision_category(a, 1);
    sim.set_collision_category(b, 2);

    sim.frame_move(1.0 / 60.0);
    assert!(
        log.borrow().is_empty(),
        "filtered categories must not produce events"
    );
}

#[test]
fn sensor_geom_reports_but_never_collides() {
    let mut sim = Simulator::new("sensors", PhysicsConfig::default());

    let solid = BodyBlueprint {
        name: "ball".into(),
        is_static: false,
        cog: Vec3::zeros(),
        geoms: vec![{
            let mut g = Geom::new("hull", Shape::Sphere { radius: 0.5 });
            g.material.mass = 5.0;
            g
        }],
    };
    let trigger = BodyBlueprint {
        name: "trigger".into(),
        is_static: false,
        cog: Vec3::zeros(),
        geoms: vec![{
            let mut g = Geom::new("zone", Shape::Sphere { radius: 1.0 });
            g.material.mass = 1.0;
            g.sensor = true;
            g
        }],
    };

    let a = sim.instantiate(&solid);
    let b = sim.instantiate(&trigger);
    for (id, x) in [(a, 0.0f32), (b, 0.6f32)] {
        let (body, world) = sim.body_and_world_mut(id);
        body.set_position(world, Vec3::new(x, 0.0, 0.0));
        body.enable_gravity(world, false);
        let state = body.state;
        world.body_mut(state).auto_disable = false;
    }

    // Sensors are not auto-added to a space; placement is the owner's
    // call.
    let zone = sim.body(b).geoms[0];
    assert!(sim.geoms()[zone].space.is_none());
    sim.set_geom_space(zone, Some(SpaceSlot::Actor));

    let log: Log = Rc::default();
    let sink = log.clone();
    sim.set_collision_handler(
        zone,
        Box::new(move |event| {
            sink.borrow_mut().push(Recorded {
                this_geom: event.this_geom,
                kind: event.kind,
                normal: event.normal,
                penetration: event.penetration,
            });
            ContactGeneration::None
        }),
    );

    let pos_before = sim.body(a).position(sim.world());
    for _ in 0..10 {
        sim.frame_move(1.0 / 60.0);
    }

    // The sensor observed the overlap but never generated joints, so the
    // solid body was not pushed.
    assert!(!log.borrow().is_empty());
    assert!(log.borrow().iter().any(|e| e.this_geom == zone));
    let moved = (sim.body(a).position(sim.world()) - pos_before).norm();
    assert!(moved < 1e-3, "sensor must not push bodies (moved {moved})");
}

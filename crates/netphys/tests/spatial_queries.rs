//! Spatial query scenarios: quadtree-backed static space, multi-hit ray
//! enumeration and single-geom occupancy checks.

use netphys::collision::{CollisionEventKind, Geom};
use netphys::foundation::math::BodyFrame;
use netphys::prelude::*;

fn wall_blueprint(name: &str) -> BodyBlueprint {
    let mut geom = Geom::new(format!("{name}-slab"), Shape::Box {
        x: 0.5,
        y: 4.0,
        z: 4.0,
    });
    geom.material = Material {
        friction: 1.0,
        bounciness: 0.0,
        mass: 100.0,
    };
    BodyBlueprint {
        name: name.into(),
        is_static: true,
        cog: Vec3::zeros(),
        geoms: vec![geom],
    }
}

/// A free ray geom pointing along +X from the given origin.
fn ray_along_x(sim: &mut Simulator, origin: Vec3, length: f32) -> netphys::collision::GeomId {
    let mut ray = Geom::new("probe", Shape::Ray { length });
    let rotation = nalgebra::Rotation3::rotation_between(
        &Vec3::new(0.0, 0.0, 1.0),
        &Vec3::new(1.0, 0.0, 0.0),
    )
    .unwrap()
    .matrix()
    .clone_owned();
    ray.offset = BodyFrame::new(rotation, origin);
    sim.add_free_geom(ray, None)
}

#[test]
fn ray_multiple_enumerates_walls_in_distance_order() {
    let mut sim = Simulator::new("range", PhysicsConfig::default());
    sim.make_static_space_quadtree(Vec3::zeros(), Vec3::new(64.0, 16.0, 64.0), 4);

    // Three parallel walls at x = 5, 10, 15.
    for (i, x) in [10.0f32, 5.0, 15.0].into_iter().enumerate() {
        let id = sim.instantiate(&wall_blueprint(&format!("wall-{i}")));
        {
            let (body, world) = sim.body_and_world_mut(id);
            body.set_position(world, Vec3::new(x, 0.0, 0.0));
        }
        sim.update_body_bounds(id);
    }
    assert_eq!(sim.static_space().member_count(), 3);

    let probe = ray_along_x(&mut sim, Vec3::zeros(), 100.0);

    let mut hits = Vec::new();
    sim.collide_ray_multiple(SpaceSlot::Static, probe, |event| {
        hits.push((event.penetration, event.kind));
    });

    // Each wall is entered and exited, all hits sorted by distance.
    assert!(hits.len() >= 3);
    assert!(hits.windows(2).all(|w| w[0].0 <= w[1].0));
    assert!(hits.iter().all(|h| h.1 == CollisionEventKind::Single));
    // First hit is the near face of the nearest wall.
    assert!((hits[0].0 - 4.75).abs() < 0.1, "first hit at {}", hits[0].0);

    sim.destroy_free_geom(probe);
}

#[test]
fn ray_respects_length_limit() {
    let mut sim = Simulator::new("range", PhysicsConfig::default());
    let id = sim.instantiate(&wall_blueprint("wall"));
    {
        let (body, world) = sim.body_and_world_mut(id);
        body.set_position(world, Vec3::new(10.0, 0.0, 0.0));
    }

    let probe = ray_along_x(&mut sim, Vec3::zeros(), 5.0);
    let mut hits = 0;
    sim.collide_ray_multiple(SpaceSlot::Static, probe, |_| hits += 1);
    assert_eq!(hits, 0, "wall at 10m must be out of reach of a 5m ray");
}

#[test]
fn single_geom_query_checks_spawn_occupancy() {
    let mut sim = Simulator::new("spawn", PhysicsConfig::default());
    let wall = sim.instantiate(&wall_blueprint("wall"));
    {
        let (body, world) = sim.body_and_world_mut(wall);
        body.set_position(world, Vec3::new(0.0, 0.0, 0.0));
    }

    // Probe sphere overlapping the wall: occupied.
    let mut probe = Geom::new("spawn-probe", Shape::Sphere { radius: 1.0 });
    probe.offset = BodyFrame::from_translation(Vec3::new(0.2, 0.0, 0.0));
    let probe = sim.add_free_geom(probe, None);

    let mut occupied = false;
    sim.collide_geom(SpaceSlot::Static, probe, |_| occupied = true);
    assert!(occupied);

    // Far away: free.
    let mut far_probe = Geom::new("far-probe", Shape::Sphere { radius: 1.0 });
    far_probe.offset = BodyFrame::from_translation(Vec3::new(30.0, 0.0, 0.0));
    let far_probe = sim.add_free_geom(far_probe, None);

    let mut occupied = false;
    sim.collide_geom(SpaceSlot::Static, far_probe, |_| occupied = true);
    assert!(!occupied);
}

#[test]
fn quadtree_requires_empty_space() {
    let mut sim = Simulator::new("late", PhysicsConfig::default());
    let _wall = sim.instantiate(&wall_blueprint("wall"));

    // Too late: a geom already lives in the static space. The call is
    // refused and the existing member stays queryable.
    sim.make_static_space_quadtree(Vec3::zeros(), Vec3::from_element(32.0), 4);
    assert_eq!(sim.static_space().member_count(), 1);
}

#[test]
fn heightfield_reports_sphere_contact() {
    let mut sim = Simulator::new("terrain", PhysicsConfig::default());

    // A flat 16x16 field at height 2.
    let field = netphys::collision::HeightfieldData {
        res_x: 17,
        res_z: 17,
        horizontal_scale: 1.0,
        min_height: 0.0,
        max_height: 4.0,
        heights: vec![2.0; 17 * 17],
    };
    let terrain = Geom::new(
        "terrain",
        Shape::Heightfield(std::sync::Arc::new(field)),
    );
    sim.add_free_geom(terrain, Some(SpaceSlot::Static));

    // Sphere resting just below the surface is reported.
    let mut probe = Geom::new("ball-probe", Shape::Sphere { radius: 0.5 });
    probe.offset = BodyFrame::from_translation(Vec3::new(0.0, 2.3, 0.0));
    let probe = sim.add_free_geom(probe, None);

    let mut contact_normal = None;
    sim.collide_geom(SpaceSlot::Static, probe, |event| {
        contact_normal = Some(event.normal);
    });
    let normal = contact_normal.expect("sphere touching terrain");
    assert!(normal.y > 0.9, "flat terrain normal points up");
}

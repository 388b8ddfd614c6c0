//! Quadtree spatial partitioning for static-heavy collision spaces
//!
//! Divides the XZ plane into hierarchical quadrants; the Y axis is not
//! partitioned, which fits mostly-flat level geometry. Each node subdivides
//! into 4 quadrants when entry density exceeds a threshold.

use crate::collision::aabb::Aabb;
use crate::collision::geom::GeomId;
use crate::foundation::math::Vec3;

const MAX_ENTRIES_PER_NODE: usize = 8;

/// Entry stored in the quadtree with its cached bounds.
#[derive(Debug, Clone, Copy)]
struct Entry {
    id: GeomId,
    aabb: Aabb,
}

/// Single node in the quadtree hierarchy
#[derive(Debug)]
struct Node {
    /// World-space bounds of this node (Y covers everything)
    bounds: Aabb,
    /// Entries in this node; interior nodes keep the ones straddling a
    /// quadrant boundary
    entries: Vec<Entry>,
    /// Child nodes (4 quadrants), `None` for leaves
    children: Option<Box<[Node; 4]>>,
    /// Remaining subdivision budget
    depth_left: u32,
}

impl Node {
    fn new(bounds: Aabb, depth_left: u32) -> Self {
        Self {
            bounds,
            entries: Vec::new(),
            children: None,
            depth_left,
        }
    }

    fn subdivide(&mut self) {
        let center = self.bounds.center();
        let extents = self.bounds.extents();
        let half = Vec3::new(extents.x * 0.5, extents.y, extents.z * 0.5);

        let children = [0usize, 1, 2, 3].map(|quadrant| {
            let x_sign = if quadrant & 1 != 0 { 1.0 } else { -1.0 };
            let z_sign = if quadrant & 2 != 0 { 1.0 } else { -1.0 };
            let child_center = Vec3::new(
                center.x + half.x * x_sign,
                center.y,
                center.z + half.z * z_sign,
            );
            Node::new(Aabb::from_center_extents(child_center, half), self.depth_left - 1)
        });
        self.children = Some(Box::new(children));

        // Push fitting entries down; straddlers stay here.
        let entries = std::mem::take(&mut self.entries);
        for entry in entries {
            self.insert(entry);
        }
    }

    fn child_for(&mut self, aabb: &Aabb) -> Option<&mut Node> {
        let center = self.bounds.center();
        let fully_right = aabb.min.x >= center.x;
        let fully_left = aabb.max.x <= center.x;
        let fully_front = aabb.min.z >= center.z;
        let fully_back = aabb.max.z <= center.z;

        let quadrant = match (fully_left, fully_right, fully_back, fully_front) {
            (true, _, true, _) => 0,
            (_, true, true, _) => 1,
            (true, _, _, true) => 2,
            (_, true, _, true) => 3,
            _ => return None,
        };
        self.children.as_mut().map(|c| &mut c[quadrant])
    }

    fn insert(&mut self, entry: Entry) {
        if self.children.is_none() {
            self.entries.push(entry);
            if self.entries.len() > MAX_ENTRIES_PER_NODE && self.depth_left > 0 {
                self.subdivide();
            }
            return;
        }

        match self.child_for(&entry.aabb) {
            Some(child) => child.insert(entry),
            None => self.entries.push(entry),
        }
    }

    fn remove(&mut self, id: GeomId) -> bool {
        if let Some(index) = self.entries.iter().position(|e| e.id == id) {
            self.entries.swap_remove(index);
            return true;
        }
        if let Some(children) = self.children.as_mut() {
            return children.iter_mut().any(|c| c.remove(id));
        }
        false
    }

    fn query(&self, aabb: &Aabb, out: &mut Vec<GeomId>) {
        if !self.bounds.intersects(aabb) {
            return;
        }
        for entry in &self.entries {
            if entry.aabb.intersects(aabb) {
                out.push(entry.id);
            }
        }
        if let Some(children) = self.children.as_ref() {
            for child in children.iter() {
                child.query(aabb, out);
            }
        }
    }

    fn collect(&self, out: &mut Vec<(GeomId, Aabb)>) {
        out.extend(self.entries.iter().map(|e| (e.id, e.aabb)));
        if let Some(children) = self.children.as_ref() {
            for child in children.iter() {
                child.collect(out);
            }
        }
    }
}

/// Quadtree over the XZ plane holding geoms by their world AABB.
#[derive(Debug)]
pub struct Quadtree {
    root: Node,
    len: usize,
}

impl Quadtree {
    /// Create a quadtree centered at `center` covering `extents`
    /// (half-sizes) with at most `depth` subdivision levels.
    pub fn new(center: Vec3, extents: Vec3, depth: u32) -> Self {
        Self {
            root: Node::new(Aabb::from_center_extents(center, extents), depth),
            len: 0,
        }
    }

    /// Insert a geom with its world bounds.
    pub fn insert(&mut self, id: GeomId, aabb: Aabb) {
        self.root.insert(Entry { id, aabb });
        self.len += 1;
    }

    /// Remove a geom; logs if it was not present.
    pub fn remove(&mut self, id: GeomId) {
        if self.root.remove(id) {
            self.len -= 1;
        } else {
            log::warn!("removal of unknown geom {id:?} from quadtree");
        }
    }

    /// Re-insert a geom under new bounds.
    pub fn update(&mut self, id: GeomId, aabb: Aabb) {
        if self.root.remove(id) {
            self.len -= 1;
        }
        self.insert(id, aabb);
    }

    /// Collect all geoms whose bounds intersect `aabb`.
    pub fn query(&self, aabb: &Aabb, out: &mut Vec<GeomId>) {
        self.root.query(aabb, out);
    }

    /// All entries with their cached bounds.
    pub fn entries(&self) -> Vec<(GeomId, Aabb)> {
        let mut out = Vec::with_capacity(self.len);
        self.root.collect(&mut out);
        out
    }

    /// Number of stored geoms
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn keys(n: usize) -> Vec<GeomId> {
        let mut map: SlotMap<GeomId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    fn unit_box_at(x: f32, z: f32) -> Aabb {
        Aabb::from_center_extents(Vec3::new(x, 0.0, z), Vec3::from_element(0.5))
    }

    #[test]
    fn query_finds_only_overlapping() {
        let ids = keys(3);
        let mut tree = Quadtree::new(Vec3::zeros(), Vec3::new(100.0, 100.0, 100.0), 4);
        tree.insert(ids[0], unit_box_at(0.0, 0.0));
        tree.insert(ids[1], unit_box_at(50.0, 50.0));
        tree.insert(ids[2], unit_box_at(-50.0, 50.0));

        let mut hits = Vec::new();
        tree.query(&unit_box_at(0.2, 0.2), &mut hits);
        assert_eq!(hits, vec![ids[0]]);
    }

    #[test]
    fn subdivision_keeps_all_entries_findable() {
        let ids = keys(64);
        let mut tree = Quadtree::new(Vec3::zeros(), Vec3::new(64.0, 10.0, 64.0), 5);
        for (i, id) in ids.iter().enumerate() {
            let x = (i % 8) as f32 * 8.0 - 28.0;
            let z = (i / 8) as f32 * 8.0 - 28.0;
            tree.insert(*id, unit_box_at(x, z));
        }
        assert_eq!(tree.len(), 64);

        let mut hits = Vec::new();
        tree.query(&Aabb::from_center_extents(Vec3::zeros(), Vec3::from_element(100.0)), &mut hits);
        assert_eq!(hits.len(), 64);
    }

    #[test]
    fn remove_then_query_misses() {
        let ids = keys(1);
        let mut tree = Quadtree::new(Vec3::zeros(), Vec3::from_element(10.0), 3);
        tree.insert(ids[0], unit_box_at(1.0, 1.0));
        tree.remove(ids[0]);

        let mut hits = Vec::new();
        tree.query(&unit_box_at(1.0, 1.0), &mut hits);
        assert!(hits.is_empty());
        assert!(tree.is_empty());
    }
}

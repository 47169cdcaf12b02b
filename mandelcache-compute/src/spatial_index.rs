//! R-tree over cached sample points.
//!
//! Every stored entry occupies a single coordinate; the boxes passed to
//! [`SpatialIndex::query`] are tolerance windows chosen by the caller. Inner
//! nodes carry the bounding box of their subtree, all leaves sit at the same
//! depth, and a node holds at most [`MAX_CHILDREN`] children, so inserts and
//! sparse queries are logarithmic in the number of entries.

use mandelcache_core::{BoundingBox, CacheEntry, SamplePoint};

/// Maximum number of children (or entries, for leaves) in one node.
pub const MAX_CHILDREN: usize = 9;

/// Minimum fill of a node produced by a split.
pub const MIN_CHILDREN: usize = 4;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        bbox: BoundingBox,
        entries: Vec<CacheEntry>,
    },
    Branch {
        bbox: BoundingBox,
        children: Vec<Node>,
    },
}

impl Node {
    fn empty_leaf() -> Self {
        Node::Leaf {
            bbox: BoundingBox::empty(),
            entries: Vec::new(),
        }
    }

    fn leaf(entries: Vec<CacheEntry>) -> Self {
        let bbox = entries_bbox(&entries);
        Node::Leaf { bbox, entries }
    }

    fn branch(children: Vec<Node>) -> Self {
        let bbox = children_bbox(&children);
        Node::Branch { bbox, children }
    }

    fn bbox(&self) -> &BoundingBox {
        match self {
            Node::Leaf { bbox, .. } | Node::Branch { bbox, .. } => bbox,
        }
    }

    /// Insert below this node. Returns the new sibling when this node had to
    /// split.
    fn insert(&mut self, entry: CacheEntry) -> Option<Node> {
        match self {
            Node::Leaf { bbox, entries } => {
                bbox.extend_point(&entry.point);
                entries.push(entry);
                if entries.len() <= MAX_CHILDREN {
                    return None;
                }
                let sibling = split_in_half(entries, *bbox, |e| e.point);
                *bbox = entries_bbox(entries);
                Some(Node::leaf(sibling))
            }
            Node::Branch { bbox, children } => {
                let entry_box = entry.bbox();
                *bbox = bbox.union(&entry_box);
                let best = choose_subtree(children, &entry_box);
                if let Some(sibling) = children[best].insert(entry) {
                    children.push(sibling);
                }
                if children.len() <= MAX_CHILDREN {
                    return None;
                }
                let sibling = split_in_half(children, *bbox, |c| c.bbox().center());
                *bbox = children_bbox(children);
                Some(Node::branch(sibling))
            }
        }
    }

    fn query<'a>(&'a self, window: &BoundingBox, out: &mut Vec<&'a CacheEntry>) {
        if !self.bbox().intersects(window) {
            return;
        }
        match self {
            Node::Leaf { entries, .. } => {
                out.extend(entries.iter().filter(|e| window.contains(&e.point)));
            }
            Node::Branch { children, .. } => {
                for child in children {
                    child.query(window, out);
                }
            }
        }
    }

    fn height(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Branch { children, .. } => 1 + children.first().map_or(0, Node::height),
        }
    }
}

fn entries_bbox(entries: &[CacheEntry]) -> BoundingBox {
    entries.iter().fold(BoundingBox::empty(), |acc, e| {
        acc.union(&BoundingBox::from_point(e.point))
    })
}

fn children_bbox(children: &[Node]) -> BoundingBox {
    children
        .iter()
        .fold(BoundingBox::empty(), |acc, c| acc.union(c.bbox()))
}

/// Pick the child needing the least enlargement to cover `bbox`.
///
/// Area growth is compared first, then perimeter growth (points and
/// collinear runs have zero area), then current area. Ties go to the first
/// child.
fn choose_subtree(children: &[Node], bbox: &BoundingBox) -> usize {
    let mut best = 0;
    let mut best_cost = (f64::INFINITY, f64::INFINITY, f64::INFINITY);
    for (index, child) in children.iter().enumerate() {
        let (area_growth, margin_growth) = child.bbox().enlargement(bbox);
        let cost = (area_growth, margin_growth, child.bbox().area());
        if cost < best_cost {
            best = index;
            best_cost = cost;
        }
    }
    best
}

/// Sort `items` along the longer axis of `bbox` and move the upper half into
/// the returned vector.
fn split_in_half<T>(
    items: &mut Vec<T>,
    bbox: BoundingBox,
    center: impl Fn(&T) -> SamplePoint,
) -> Vec<T> {
    if bbox.width() >= bbox.height() {
        items.sort_by(|a, b| center(a).r().total_cmp(&center(b).r()));
    } else {
        items.sort_by(|a, b| center(a).i().total_cmp(&center(b).i()));
    }
    let keep = (items.len() / 2).max(MIN_CHILDREN);
    items.split_off(keep)
}

/// Sort-tile-recursive packing of one tree level.
fn pack<T>(
    mut items: Vec<T>,
    center: impl Fn(&T) -> SamplePoint,
    make: impl Fn(Vec<T>) -> Node,
) -> Vec<Node> {
    let groups = items.len().div_ceil(MAX_CHILDREN);
    let strips = (groups as f64).sqrt().ceil().max(1.0) as usize;
    let strip_len = strips * MAX_CHILDREN;

    items.sort_by(|a, b| center(a).r().total_cmp(&center(b).r()));

    let mut nodes = Vec::with_capacity(groups);
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        let mut strip: Vec<T> = items.by_ref().take(strip_len).collect();
        strip.sort_by(|a, b| center(a).i().total_cmp(&center(b).i()));
        let mut strip = strip.into_iter().peekable();
        while strip.peek().is_some() {
            nodes.push(make(strip.by_ref().take(MAX_CHILDREN).collect()));
        }
    }
    nodes
}

/// Bounding-box tree of [`CacheEntry`] values.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    root: Node,
    len: usize,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self {
            root: Node::empty_leaf(),
            len: 0,
        }
    }

    /// Build a packed tree from `entries` in one pass.
    pub fn bulk_load(entries: Vec<CacheEntry>) -> Self {
        let len = entries.len();
        if len == 0 {
            return Self::new();
        }
        let mut level = pack(entries, |e| e.point, Node::leaf);
        while level.len() > 1 {
            level = pack(level, |n| n.bbox().center(), Node::branch);
        }
        match level.pop() {
            Some(root) => Self { root, len },
            None => Self::new(),
        }
    }

    pub fn insert(&mut self, entry: CacheEntry) {
        self.len += 1;
        if let Some(sibling) = self.root.insert(entry) {
            let old_root = std::mem::replace(&mut self.root, Node::empty_leaf());
            self.root = Node::branch(vec![old_root, sibling]);
        }
    }

    /// All entries whose point lies inside `window` (edges inclusive).
    ///
    /// The order is deterministic for a given insertion history but otherwise
    /// unspecified.
    pub fn query(&self, window: &BoundingBox) -> Vec<&CacheEntry> {
        let mut out = Vec::new();
        if self.len > 0 {
            self.root.query(window, &mut out);
        }
        out
    }

    /// Keep only the entries matching `keep`; returns how many were removed.
    ///
    /// The tree is rebuilt from the survivors with [`SpatialIndex::bulk_load`].
    pub fn retain(&mut self, mut keep: impl FnMut(&CacheEntry) -> bool) -> usize {
        let before = self.len;
        let survivors: Vec<CacheEntry> = self.iter().filter(|&e| keep(e)).copied().collect();
        if survivors.len() == before {
            return 0;
        }
        *self = Self::bulk_load(survivors);
        before - self.len
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bounding box of every stored point; empty when the index is.
    pub fn bounds(&self) -> BoundingBox {
        *self.root.bbox()
    }

    /// Number of levels from root to leaves.
    pub fn height(&self) -> usize {
        self.root.height()
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            stack: vec![&self.root],
            current: (&[] as &[CacheEntry]).iter(),
        }
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<CacheEntry> for SpatialIndex {
    fn from_iter<I: IntoIterator<Item = CacheEntry>>(iter: I) -> Self {
        Self::bulk_load(iter.into_iter().collect())
    }
}

/// Depth-first iterator over stored entries.
pub struct Iter<'a> {
    stack: Vec<&'a Node>,
    current: std::slice::Iter<'a, CacheEntry>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a CacheEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.current.next() {
                return Some(entry);
            }
            match self.stack.pop()? {
                Node::Leaf { entries, .. } => self.current = entries.iter(),
                Node::Branch { children, .. } => self.stack.extend(children.iter().rev()),
            }
        }
    }
}

impl<'a> IntoIterator for &'a SpatialIndex {
    type Item = &'a CacheEntry;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mandelcache_core::{Evaluation, RecurrenceState};

    fn entry(r: f64, i: f64, n: u32) -> CacheEntry {
        let evaluation = Evaluation::from_state(RecurrenceState::new(r, i), 1000.0, false);
        CacheEntry::new(SamplePoint::new(r, i), n, &evaluation)
    }

    fn grid_entries(side: usize) -> Vec<CacheEntry> {
        let mut entries = Vec::with_capacity(side * side);
        for row in 0..side {
            for col in 0..side {
                entries.push(entry(col as f64 * 0.1 - 2.0, row as f64 * 0.1 - 2.0, 10));
            }
        }
        entries
    }

    fn brute_force<'a>(entries: &'a [CacheEntry], window: &BoundingBox) -> Vec<&'a CacheEntry> {
        entries.iter().filter(|e| window.contains(&e.point)).collect()
    }

    fn sorted_points(found: &[&CacheEntry]) -> Vec<(f64, f64)> {
        let mut points: Vec<(f64, f64)> = found.iter().map(|e| e.point.into_parts()).collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        points
    }

    /// Walk the tree checking fill limits, box coverage and leaf depth.
    fn check_node(node: &Node, depth: usize, leaf_depths: &mut Vec<usize>, is_root: bool) {
        match node {
            Node::Leaf { bbox, entries } => {
                assert!(entries.len() <= MAX_CHILDREN);
                assert!(is_root || !entries.is_empty());
                for e in entries {
                    assert!(bbox.contains(&e.point));
                }
                leaf_depths.push(depth);
            }
            Node::Branch { bbox, children } => {
                assert!(children.len() <= MAX_CHILDREN);
                assert!(!children.is_empty());
                for child in children {
                    assert!(bbox.contains_box(child.bbox()));
                    check_node(child, depth + 1, leaf_depths, false);
                }
            }
        }
    }

    fn assert_well_formed(index: &SpatialIndex) {
        let mut depths = Vec::new();
        check_node(&index.root, 1, &mut depths, true);
        assert!(depths.iter().all(|&d| d == depths[0]), "uneven leaves");
        assert_eq!(depths[0], index.height());
        assert_eq!(index.iter().count(), index.len());
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = SpatialIndex::new();
        assert!(index.is_empty());
        assert!(index.bounds().is_empty());
        assert!(index
            .query(&BoundingBox::from_bounds(-10.0, 10.0, -10.0, 10.0))
            .is_empty());
    }

    #[test]
    fn query_finds_point_inside_window() {
        let mut index = SpatialIndex::new();
        index.insert(entry(-1.0, 0.0, 10));
        let window = BoundingBox::around(SamplePoint::new(-1.02, 0.01), 0.05, 0.05);
        let found = index.query(&window);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].n, 10);
    }

    #[test]
    fn query_ignores_point_outside_window() {
        let mut index = SpatialIndex::new();
        index.insert(entry(-1.0, 0.0, 10));
        let window = BoundingBox::around(SamplePoint::new(-0.9, 0.0), 0.05, 0.05);
        assert!(index.query(&window).is_empty());
    }

    #[test]
    fn query_window_edges_are_inclusive() {
        let mut index = SpatialIndex::new();
        index.insert(entry(0.5, 0.5, 1));
        let window = BoundingBox::from_bounds(0.0, 0.5, 0.0, 0.5);
        assert_eq!(index.query(&window).len(), 1);
    }

    #[test]
    fn inserts_keep_tree_balanced() {
        let entries = grid_entries(30);
        let mut index = SpatialIndex::new();
        for e in &entries {
            index.insert(*e);
        }
        assert_eq!(index.len(), 900);
        assert_well_formed(&index);
        // 900 points with at most 9 per node need at least 4 levels; a
        // degenerate tree would be far deeper.
        assert!(index.height() >= 4 && index.height() <= 8, "height {}", index.height());
    }

    #[test]
    fn query_matches_brute_force() {
        let entries = grid_entries(25);
        let mut index = SpatialIndex::new();
        for e in &entries {
            index.insert(*e);
        }
        let windows = [
            BoundingBox::from_bounds(-1.55, -1.05, -0.35, 0.25),
            BoundingBox::around(SamplePoint::new(-2.0, -2.0), 0.05, 0.05),
            BoundingBox::from_bounds(-3.0, 3.0, -3.0, 3.0),
            BoundingBox::from_bounds(5.0, 6.0, 5.0, 6.0),
        ];
        for window in &windows {
            let expected = brute_force(&entries, window);
            let found = index.query(window);
            assert_eq!(sorted_points(&found), sorted_points(&expected), "{window:?}");
        }
    }

    #[test]
    fn duplicate_coordinates_are_all_returned() {
        let mut index = SpatialIndex::new();
        for n in 0..20 {
            index.insert(entry(0.25, 0.25, n));
        }
        assert_well_formed(&index);
        let found = index.query(&BoundingBox::from_point(SamplePoint::new(0.25, 0.25)));
        assert_eq!(found.len(), 20);
    }

    #[test]
    fn query_order_is_deterministic() {
        let build = || {
            let mut index = SpatialIndex::new();
            for (k, e) in grid_entries(12).into_iter().enumerate() {
                index.insert(CacheEntry { n: k as u32, ..e });
            }
            index
        };
        let window = BoundingBox::from_bounds(-1.8, -1.2, -1.8, -1.2);
        let a: Vec<u32> = build().query(&window).iter().map(|e| e.n).collect();
        let b: Vec<u32> = build().query(&window).iter().map(|e| e.n).collect();
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn bulk_load_produces_balanced_tree() {
        let entries = grid_entries(40);
        let index = SpatialIndex::bulk_load(entries.clone());
        assert_eq!(index.len(), 1600);
        assert_well_formed(&index);
        let window = BoundingBox::from_bounds(-0.45, 0.05, -1.0, -0.5);
        assert_eq!(
            sorted_points(&index.query(&window)),
            sorted_points(&brute_force(&entries, &window))
        );
    }

    #[test]
    fn bulk_load_of_nothing_is_empty() {
        let index = SpatialIndex::bulk_load(Vec::new());
        assert!(index.is_empty());
        assert_eq!(index.height(), 1);
    }

    #[test]
    fn retain_removes_and_rebuilds() {
        let mut index: SpatialIndex = grid_entries(20).into_iter().collect();
        let keep = BoundingBox::from_bounds(-2.0, -1.05, -2.0, -1.05);
        let removed = index.retain(|e| keep.contains(&e.point));
        assert_eq!(removed, 400 - 100);
        assert_eq!(index.len(), 100);
        assert!(index.iter().all(|e| keep.contains(&e.point)));
        assert_well_formed(&index);
    }

    #[test]
    fn retain_everything_is_a_no_op() {
        let mut index: SpatialIndex = grid_entries(5).into_iter().collect();
        assert_eq!(index.retain(|_| true), 0);
        assert_eq!(index.len(), 25);
    }

    #[test]
    fn inserts_after_bulk_load_stay_balanced() {
        let mut index = SpatialIndex::bulk_load(grid_entries(10));
        for k in 0..200 {
            index.insert(entry(k as f64 * 0.013, -(k as f64) * 0.007, 3));
        }
        assert_eq!(index.len(), 300);
        assert_well_formed(&index);
    }

    #[test]
    fn clear_resets_index() {
        let mut index: SpatialIndex = grid_entries(4).into_iter().collect();
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.iter().count(), 0);
    }

    #[test]
    fn bounds_cover_all_points() {
        let index: SpatialIndex = grid_entries(10).into_iter().collect();
        let bounds = index.bounds();
        assert!(index.iter().all(|e| bounds.contains(&e.point)));
        assert!((bounds.min.r() - -2.0).abs() < 1e-12);
    }
}

//! Disjoint-set forest stored as an arena of parent indices.
//!
//! Node `i` is a representative exactly when `parent[i] == i`. `find`
//! uses path halving and `union` uses union by rank, giving near-constant
//! amortized cost per operation.

/// A union-find forest over the indices `0..len()`.
#[derive(Debug, Clone, Default)]
pub struct DisjointSetForest {
    parent: Vec<usize>,
    rank: Vec<u32>,
}

impl DisjointSetForest {
    /// Create a forest of `len` singleton sets.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    /// Add a new singleton set and return its index.
    pub fn make_set(&mut self) -> usize {
        let index = self.parent.len();
        self.parent.push(index);
        self.rank.push(0);
        index
    }

    /// Number of nodes in the forest.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.parent.len()
    }

    /// Returns `true` if the forest has no nodes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Direct parent of `node`, without compression.
    #[must_use]
    pub fn parent(&self, node: usize) -> usize {
        self.parent[node]
    }

    /// Rank of `node`. Only meaningful for representatives.
    #[must_use]
    pub fn rank(&self, node: usize) -> u32 {
        self.rank[node]
    }

    /// Returns `true` if `node` is the representative of its set.
    #[must_use]
    pub fn is_root(&self, node: usize) -> bool {
        self.parent[node] == node
    }

    /// Representative of the set containing `node`.
    ///
    /// Path halving: every visited node is re-pointed at its grandparent
    /// before the walk advances to it.
    pub fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            let grandparent = self.parent[self.parent[node]];
            self.parent[node] = grandparent;
            node = grandparent;
        }
        node
    }

    /// Merge the sets containing `a` and `b`, returning the surviving
    /// representative.
    ///
    /// The lower-rank representative is attached under the higher-rank
    /// one. On equal ranks `a`'s representative survives and its rank is
    /// incremented. Merging a set with itself changes nothing.
    pub fn union(&mut self, a: usize, b: usize) -> usize {
        let mut x = self.find(a);
        let mut y = self.find(b);
        if x == y {
            return x;
        }
        if self.rank[x] < self.rank[y] {
            std::mem::swap(&mut x, &mut y);
        }
        self.parent[y] = x;
        if self.rank[x] == self.rank[y] {
            self.rank[x] += 1;
        }
        x
    }

    /// Returns `true` if `a` and `b` are in the same set.
    pub fn same_set(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }
}

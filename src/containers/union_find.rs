/// Union-find over dense `u32` ids with path halving and union by size.
#[derive(Clone, Debug, Default)]
pub struct UnionFind {
    parent: Vec<u32>,
    size: Vec<u32>,
}

impl UnionFind {
    /// Create a structure with `n` singleton sets.
    pub fn new(n: usize) -> Self {
        Self { parent: (0..n as u32).collect(), size: vec![1; n] }
    }

    #[inline] pub fn len(&self) -> usize { self.parent.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.parent.is_empty() }

    /// Representative of the set containing `x`.
    pub fn find(&mut self, x: u32) -> u32 {
        let mut x = x as usize;
        while self.parent[x] as usize != x {
            self.parent[x] = self.parent[self.parent[x] as usize];
            x = self.parent[x] as usize;
        }
        x as u32
    }

    /// Merge the sets containing `a` and `b`; returns true if they were disjoint.
    pub fn merge(&mut self, a: u32, b: u32) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        let (big, small) = if self.size[ra as usize] >= self.size[rb as usize] { (ra, rb) } else { (rb, ra) };
        self.parent[small as usize] = big;
        self.size[big as usize] += self.size[small as usize];
        true
    }

    /// Extract the disjoint sets, ordered by their smallest member, together
    /// with the map element -> set index.
    pub fn extract_sets(&mut self) -> (Vec<Vec<u32>>, Vec<u32>) {
        const UNSET: u32 = u32::MAX;
        let n = self.parent.len();
        let mut set_of_root = vec![UNSET; n];
        let mut sets: Vec<Vec<u32>> = Vec::new();
        let mut set_of = vec![UNSET; n];
        for x in 0..n as u32 {
            let root = self.find(x) as usize;
            if set_of_root[root] == UNSET {
                set_of_root[root] = sets.len() as u32;
                sets.push(Vec::new());
            }
            let set = set_of_root[root];
            sets[set as usize].push(x);
            set_of[x as usize] = set;
        }
        (sets, set_of)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singletons_until_merged() {
        let mut uf = UnionFind::new(4);
        assert_ne!(uf.find(0), uf.find(1));
        assert!(uf.merge(0, 1));
        assert_eq!(uf.find(0), uf.find(1));
        assert!(!uf.merge(1, 0));
    }

    #[test]
    fn extract_sets_orders_by_smallest_member() {
        let mut uf = UnionFind::new(6);
        uf.merge(4, 1);
        uf.merge(5, 2);
        uf.merge(2, 3);
        let (sets, set_of) = uf.extract_sets();
        assert_eq!(sets, vec![vec![0], vec![1, 4], vec![2, 3, 5]]);
        assert_eq!(set_of, vec![0, 1, 2, 2, 1, 2]);
    }

    #[test]
    fn transitive_merges_collapse() {
        let mut uf = UnionFind::new(8);
        for i in 0..7u32 {
            uf.merge(i, i + 1);
        }
        let root = uf.find(0);
        for i in 0..8u32 {
            assert_eq!(uf.find(i), root);
        }
    }
}

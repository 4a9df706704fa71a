mod bitset;
mod flat_map;
mod union_find;

pub use bitset::DynamicBitset;
pub use flat_map::{FlatMap, FlatSet};
pub use union_find::UnionFind;

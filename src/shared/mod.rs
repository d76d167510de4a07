pub mod compdb;
pub mod notable;
pub mod sink;

pub type Set<T> = std::collections::HashSet<T, ahash::RandomState>;
pub type Map<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;

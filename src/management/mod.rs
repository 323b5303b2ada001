mod cache;

pub use cache::CacheStats;
pub use cache::DedupCache;
pub use cache::SimilarEntry;
pub use cache::now;

mod cache;
mod page_cache;
mod recent_queries;
mod schema;
mod types;

pub use cache::{LayeredCache, MemoryCache, NoCache, ResponseCache};
pub use recent_queries::RecentQueries;
pub use schema::{Database, DEFAULT_CACHE_TTL_HOURS, DEFAULT_RECENT_QUERIES_LIMIT};
pub use types::{CacheStats, DatabaseError};

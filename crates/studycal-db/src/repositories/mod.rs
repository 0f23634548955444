// All repository functions are generic over `E: Executor<'e, Database = Postgres>`
// so they accept both a `&PgPool` (direct query) and a `&mut Transaction` (atomic operations).
// Functions issuing several statements take `&mut PgConnection` instead.

pub mod plan;
pub mod progress;
pub mod session;
pub mod topic;

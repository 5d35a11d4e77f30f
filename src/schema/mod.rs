// Field type coercion and the learned type cache

mod cache;
mod coercion;

pub use cache::TypeCache;
pub use coercion::{coerce, CoercionError, CoercionKind};

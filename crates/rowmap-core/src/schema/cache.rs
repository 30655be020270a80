//! Process-wide cache of resolved record schemas.

use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use super::{Record, RecordSchema};

type Entry = Arc<dyn Any + Send + Sync>;

static SCHEMAS: OnceLock<DashMap<TypeId, Entry>> = OnceLock::new();

/// Returns the cached schema of `T`, deriving it on first use.
///
/// Derivation runs without holding any lock, so schemas of embedded records
/// are resolved recursively through this same function. When two callers
/// derive the same type concurrently the first insert wins and the other
/// result is dropped.
#[must_use]
pub fn bindings<T: Record>() -> Arc<RecordSchema<T>> {
    let cache = SCHEMAS.get_or_init(DashMap::new);
    let key = TypeId::of::<T>();

    let hit = cache.get(&key).map(|entry| Arc::clone(entry.value()));
    if let Some(schema) = hit.and_then(|entry| entry.downcast::<RecordSchema<T>>().ok()) {
        return schema;
    }

    let derived = Arc::new(RecordSchema::<T>::derive());
    let stored = Arc::clone(
        cache
            .entry(key)
            .or_insert_with(|| Arc::clone(&derived) as Entry)
            .value(),
    );
    stored.downcast::<RecordSchema<T>>().unwrap_or(derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaBuilder;
    use std::thread;

    #[derive(Default)]
    struct Ticket {
        id: i64,
        title: String,
    }

    impl Record for Ticket {
        fn describe(s: &mut SchemaBuilder<Self>) {
            s.field("id", |t| &t.id, |t| &mut t.id).primary_key();
            s.field("title", |t| &t.title, |t| &mut t.title);
        }
    }

    #[test]
    fn test_cache_returns_same_instance() {
        let a = bindings::<Ticket>();
        let b = bindings::<Ticket>();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_concurrent_first_derivation() {
        #[derive(Default)]
        struct Burst {
            n: i32,
        }

        impl Record for Burst {
            fn describe(s: &mut SchemaBuilder<Self>) {
                s.field("n", |b| &b.n, |b| &mut b.n);
            }
        }

        let handles: Vec<_> = (0..8).map(|_| thread::spawn(bindings::<Burst>)).collect();
        let schemas: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for schema in &schemas {
            assert_eq!(schema.column_names(), vec!["n"]);
            assert_eq!(schema.table(), schemas[0].table());
        }
        assert!(Arc::ptr_eq(&bindings::<Burst>(), &bindings::<Burst>()));
    }
}

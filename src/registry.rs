//! Process-wide type registry.
//!
//! Three registrations, all global and lock-protected:
//! adapters (host type to engine value, applied to outbound parameters),
//! converters (declared column type to host value, applied to inbound cells),
//! and an optional row factory applied to every fetched row unless a
//! per-database factory or a record-typed target takes precedence.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

use crate::value::{Row, Value};

/// Row factory: reshapes a fetched row before it reaches the caller.
pub type RowFactory = Arc<dyn Fn(Row) -> Row + Send + Sync>;

type Adapter = Arc<dyn Fn(&dyn Any) -> Option<Value> + Send + Sync>;
type Converter = Arc<dyn Fn(Value) -> Value + Send + Sync>;

#[derive(Default)]
struct TypeRegistry {
    adapters: HashMap<TypeId, Adapter>,
    converters: HashMap<String, Converter>,
    row_factory: Option<RowFactory>,
}

static REGISTRY: LazyLock<RwLock<TypeRegistry>> =
    LazyLock::new(|| RwLock::new(TypeRegistry::default()));

fn read() -> std::sync::RwLockReadGuard<'static, TypeRegistry> {
    REGISTRY.read().unwrap_or_else(|e| e.into_inner())
}

fn write() -> std::sync::RwLockWriteGuard<'static, TypeRegistry> {
    REGISTRY.write().unwrap_or_else(|e| e.into_inner())
}

/// Register a function adapting host values of type `T` to engine values in
/// query parameters. Registration is global; a later registration for the
/// same type replaces the earlier one.
pub fn register_adapter<T>(transformer: impl Fn(&T) -> Value + Send + Sync + 'static)
where
    T: Any + Send + Sync,
{
    let adapter: Adapter = Arc::new(move |any| any.downcast_ref::<T>().map(&transformer));
    write().adapters.insert(TypeId::of::<T>(), adapter);
}

/// Register a function converting database values of the named declared
/// column type to host values in query results. Type names match
/// case-insensitively against the column declaration.
pub fn register_converter(
    typename: &str,
    transformer: impl Fn(Value) -> Value + Send + Sync + 'static,
) {
    write()
        .converters
        .insert(typename.to_uppercase(), Arc::new(transformer));
}

/// Register a process-wide row factory, or `None` to reset to the default.
pub fn register_row_factory(factory: Option<impl Fn(Row) -> Row + Send + Sync + 'static>) {
    write().row_factory = factory.map(|f| Arc::new(f) as RowFactory);
}

/// The process-wide row factory, if registered.
pub fn row_factory() -> Option<RowFactory> {
    read().row_factory.clone()
}

/// Run a host value through its registered adapter, if any.
pub fn adapt_host<T: Any>(host: &T) -> Option<Value> {
    read()
        .adapters
        .get(&TypeId::of::<T>())
        .and_then(|adapter| adapter(host))
}

/// Run an outbound parameter through the adapter registered for its host
/// type. Values without a matching adapter pass through unchanged.
pub fn adapt(value: Value) -> Value {
    let registry = read();
    if registry.adapters.is_empty() {
        return value;
    }
    let adapted = match &value {
        Value::Null => None,
        Value::Bool(v) => registry
            .adapters
            .get(&TypeId::of::<bool>())
            .and_then(|a| a(v)),
        Value::Int(v) => registry
            .adapters
            .get(&TypeId::of::<i64>())
            .and_then(|a| a(v)),
        Value::Float(v) => registry
            .adapters
            .get(&TypeId::of::<f64>())
            .and_then(|a| a(v)),
        Value::Text(v) => registry
            .adapters
            .get(&TypeId::of::<String>())
            .and_then(|a| a(v)),
        Value::Bytes(v) => registry
            .adapters
            .get(&TypeId::of::<Vec<u8>>())
            .and_then(|a| a(v)),
        Value::Json(v) => registry
            .adapters
            .get(&TypeId::of::<serde_json::Value>())
            .and_then(|a| a(v)),
    };
    adapted.unwrap_or(value)
}

/// Whether a converter is registered for the declared type name.
pub fn has_converter(typename: &str) -> bool {
    read().converters.contains_key(&typename.to_uppercase())
}

/// Run an inbound cell through the converter for its declared type, if one is
/// registered. Unknown types pass through unchanged.
pub fn convert(typename: &str, value: Value) -> Value {
    if value.is_null() {
        return value;
    }
    let converter = read().converters.get(&typename.to_uppercase()).cloned();
    match converter {
        Some(f) => f(value),
        None => value,
    }
}

/// Restore the empty registry. Test hook.
pub fn reset() {
    *write() = TypeRegistry::default();
}

/// Serializes unit tests that touch the process-wide registry.
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

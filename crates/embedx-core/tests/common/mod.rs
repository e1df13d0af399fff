use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use embedx_core::{
    Adapter, Callbacks, Changeset, EmbedError, Entity, EntitySchema, FieldDef, FieldType, Hook,
    Registry, Relation, Result,
};
use serde_json::{json, Value};

/// Schemas used across the integration suites
///
/// person ─┬─ profile (one)
///         └─ addresses (many) ── geo (one)
#[allow(dead_code)]
pub struct Fixtures {
    pub registry: Registry,
    pub person: Arc<EntitySchema>,
    pub profile: Arc<EntitySchema>,
    pub address: Arc<EntitySchema>,
    pub geo: Arc<EntitySchema>,
}

#[allow(dead_code)]
impl Fixtures {
    pub fn profile_relation(&self) -> &Relation {
        self.person.relation("profile").unwrap()
    }

    pub fn addresses_relation(&self) -> &Relation {
        self.person.relation("addresses").unwrap()
    }

    pub fn geo_relation(&self) -> &Relation {
        self.address.relation("geo").unwrap()
    }
}

/// Register the person/profile/address/geo schemas
#[allow(dead_code)]
pub fn fixtures() -> Fixtures {
    let mut registry = Registry::new();

    let geo = registry
        .register(
            EntitySchema::builder("geo")
                .primary_key("id", FieldType::Uuid)
                .autogenerate()
                .field("lat", FieldType::Float)
                .field("lng", FieldType::Float)
                .build()
                .unwrap(),
        )
        .unwrap();

    let address = registry
        .register(
            EntitySchema::builder("address")
                .primary_key("id", FieldType::Uuid)
                .autogenerate()
                .required("city", FieldType::String)
                .field("street", FieldType::String)
                .embeds_one("geo", Arc::clone(&geo))
                .build()
                .unwrap(),
        )
        .unwrap();

    let profile = registry
        .register(
            EntitySchema::builder("profile")
                .primary_key("id", FieldType::Uuid)
                .autogenerate()
                .required("handle", FieldType::String)
                .field_def(FieldDef::new("bio", FieldType::String).default_value(json!("")))
                .build()
                .unwrap(),
        )
        .unwrap();

    let person = registry
        .register(
            EntitySchema::builder("person")
                .primary_key("id", FieldType::Id)
                .required("name", FieldType::String)
                .embeds_one("profile", Arc::clone(&profile))
                .embeds_many("addresses", Arc::clone(&address))
                .build()
                .unwrap(),
        )
        .unwrap();

    Fixtures {
        registry,
        person,
        profile,
        address,
        geo,
    }
}

/// A fully populated address entity
#[allow(dead_code)]
pub fn address(id: Value, city: &str) -> Entity {
    Entity::new("address")
        .with("id", id)
        .with("city", json!(city))
        .with("street", Value::Null)
        .with_one("geo", None)
}

/// A fully populated geo entity
#[allow(dead_code)]
pub fn geo(id: &str, lat: f64, lng: f64) -> Entity {
    Entity::new("geo")
        .with("id", json!(id))
        .with("lat", json!(lat))
        .with("lng", json!(lng))
}

/// A fully populated profile entity
#[allow(dead_code)]
pub fn profile(id: &str, handle: &str) -> Entity {
    Entity::new("profile")
        .with("id", json!(id))
        .with("handle", json!(handle))
        .with("bio", json!(""))
}

/// A persisted person with the given nested values
#[allow(dead_code)]
pub fn person(profile: Option<Entity>, addresses: Vec<Entity>) -> Entity {
    Entity::new("person")
        .with("id", json!(1))
        .with("name", json!("Ada"))
        .with_one("profile", profile)
        .with_many("addresses", addresses)
}

/// Adapter handing out `gen-N` keys and counting calls
#[allow(dead_code)]
#[derive(Default)]
pub struct CountingAdapter {
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl CountingAdapter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Adapter for CountingAdapter {
    fn autogenerate(&self, field_type: FieldType) -> Result<Value> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match field_type {
            FieldType::Uuid => Ok(json!(format!("gen-{}", n))),
            other => Err(EmbedError::Adapter {
                message: format!("unsupported {}", other),
            }),
        }
    }
}

/// Callbacks recording `hook:schema` for every invocation
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingCallbacks {
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingCallbacks {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Callbacks for RecordingCallbacks {
    fn apply(&self, hook: Hook, schema: &EntitySchema, changeset: Changeset) -> Result<Changeset> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{}", hook, schema.name()));
        Ok(changeset)
    }
}

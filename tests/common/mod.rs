#![allow(dead_code)]

use async_trait::async_trait;
use docrel::{
    Document, DocumentStore, EntityKind, MemoryStore, RelationDescriptor, SchemaBuilder,
    SchemaError, StoreError, StoreResult,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub struct Employee;
pub struct Absence;
pub struct Department;
pub struct Note;
pub struct Citizen;
pub struct Passport;

impl EntityKind for Employee {
    const NAME: &'static str = "Employee";

    fn declare(schema: &mut SchemaBuilder<'_>) -> Result<(), SchemaError> {
        schema
            .primary_key("name")?
            .column("email")?
            .relation(
                "absences",
                RelationDescriptor::one_to_many::<Absence>("employee").cascade(),
            )?
            .relation("department", RelationDescriptor::many_to_one::<Department>())?;
        Ok(())
    }
}

impl EntityKind for Absence {
    const NAME: &'static str = "Absence";

    fn declare(schema: &mut SchemaBuilder<'_>) -> Result<(), SchemaError> {
        schema.columns(&["reason", "days"])?;
        Ok(())
    }
}

impl EntityKind for Department {
    const NAME: &'static str = "Department";

    fn declare(schema: &mut SchemaBuilder<'_>) -> Result<(), SchemaError> {
        schema
            .column("title")?
            .relation("head", RelationDescriptor::one_to_one::<Employee>())?;
        Ok(())
    }
}

impl EntityKind for Note {
    const NAME: &'static str = "Note";

    fn declare(schema: &mut SchemaBuilder<'_>) -> Result<(), SchemaError> {
        schema.columns(&["title", "body", "pinned", "tags"])?;
        Ok(())
    }
}

impl EntityKind for Citizen {
    const NAME: &'static str = "Citizen";

    fn declare(schema: &mut SchemaBuilder<'_>) -> Result<(), SchemaError> {
        schema
            .column("name")?
            .relation("passport", RelationDescriptor::one_to_one::<Passport>().cascade())?;
        Ok(())
    }
}

impl EntityKind for Passport {
    const NAME: &'static str = "Passport";

    fn declare(schema: &mut SchemaBuilder<'_>) -> Result<(), SchemaError> {
        schema
            .column("number")?
            .relation("holder", RelationDescriptor::one_to_one::<Citizen>())?;
        Ok(())
    }
}

/// Memory store that counts calls and can be told to fail.
#[derive(Default)]
pub struct ProbeStore {
    pub inner: MemoryStore,
    pub calls: AtomicUsize,
    pub inserts: AtomicUsize,
    fail_remove: Mutex<HashSet<String>>,
    fail_insert_into: Mutex<HashSet<String>>,
    fail_find_in: Mutex<HashSet<String>>,
}

impl ProbeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn fail_remove_of(&self, id: &str) {
        self.fail_remove.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_inserts_into(&self, collection: &str) {
        self.fail_insert_into
            .lock()
            .unwrap()
            .insert(collection.to_string());
    }

    pub fn fail_finds_in(&self, collection: &str) {
        self.fail_find_in.lock().unwrap().insert(collection.to_string());
    }

    pub fn allow_finds(&self) {
        self.fail_find_in.lock().unwrap().clear();
    }
}

#[async_trait]
impl DocumentStore for ProbeStore {
    async fn insert(&self, collection: &str, document: Document) -> StoreResult<Document> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert_into.lock().unwrap().contains(collection) {
            return Err(StoreError::Backend(format!("insert into {} refused", collection)));
        }
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(collection, document).await
    }

    async fn update(&self, collection: &str, id: &str, document: Document) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.update(collection, id, document).await
    }

    async fn remove(&self, collection: &str, id: &str) -> StoreResult<usize> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_remove.lock().unwrap().contains(id) {
            return Err(StoreError::Backend(format!("remove of {} refused", id)));
        }
        self.inner.remove(collection, id).await
    }

    async fn find(&self, collection: &str, predicate: &Document) -> StoreResult<Vec<Document>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_find_in.lock().unwrap().contains(collection) {
            return Err(StoreError::Backend(format!("find in {} refused", collection)));
        }
        self.inner.find(collection, predicate).await
    }
}

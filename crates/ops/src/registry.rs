//! The operation registry: the catalog of invocable operations.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::executor::OperationHandler;
use crate::schema::InputSchema;
use crate::OpsError;

/// A named, schema-described operation with its handler.
///
/// Specs are built at startup and never mutated afterwards.
#[derive(Clone)]
pub struct OperationSpec {
    name: String,
    description: String,
    schema: InputSchema,
    handler: Arc<dyn OperationHandler>,
}

impl OperationSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: InputSchema,
        handler: Arc<dyn OperationHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn schema(&self) -> &InputSchema {
        &self.schema
    }

    pub fn handler(&self) -> &Arc<dyn OperationHandler> {
        &self.handler
    }

    /// Catalog entry as exposed by the listing request.
    pub fn describe(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.schema.to_json(),
        })
    }
}

impl std::fmt::Debug for OperationSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Registry of operations, ordered by registration.
///
/// Read-only after startup; share it as `Arc<OperationRegistry>` across
/// concurrent requests without locking.
#[derive(Default)]
pub struct OperationRegistry {
    specs: Vec<OperationSpec>,
    index: HashMap<String, usize>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation. Fails if the name is already taken.
    pub fn register(&mut self, spec: OperationSpec) -> crate::Result<()> {
        if self.index.contains_key(spec.name()) {
            return Err(OpsError::DuplicateOperation(spec.name().to_string()));
        }
        self.index.insert(spec.name().to_string(), self.specs.len());
        self.specs.push(spec);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&OperationSpec> {
        self.index.get(name).map(|&i| &self.specs[i])
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All operations, in registration order.
    pub fn catalog(&self) -> &[OperationSpec] {
        &self.specs
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Catalog entries for the listing request, in registration order.
    pub fn describe(&self) -> Vec<Value> {
        self.specs.iter().map(|s| s.describe()).collect()
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.names())
            .finish()
    }
}

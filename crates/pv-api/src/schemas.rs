//! # Service Schemas
//!
//! Declares the classes the service validates against and compiles
//! their validators once, at startup.
//!
//! - `Person` / `Address`: object schemas for `POST /v1/people`.
//! - `Catalog#search(category, keyword, tags)`: an intercepted method
//!   bound from path and query parameters.

use std::sync::Arc;

use anyhow::Context;
use pv_core::{ClassId, SchemaType};
use pv_schema::{
    CompiledValidator, Constrain, EngineOptions, Field, Intercepted, Param, SchemaRegistry,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;

const SEARCH_SIGNATURE: &str =
    "fn search(&self, category: String, keyword: String, tags: Vec<String>)";

/// Catalog categories accepted by `Catalog#search`.
pub const CATEGORIES: [&str; 3] = ["books", "music", "games"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
}

/// A validated person record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub age: u32,
    pub email: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

/// Search call as seen by the catalog after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub category: String,
    pub keyword: String,
    pub tags: Vec<String>,
}

/// The compiled artifacts the service needs.
#[derive(Debug)]
pub struct Schemas {
    pub person: Arc<CompiledValidator>,
    pub search: Intercepted<SearchQuery, ApiError>,
    /// Configuration warnings raised while declaring and compiling.
    pub warnings: usize,
}

impl Schemas {
    /// Declare and compile every schema with the given engine options.
    pub fn build(options: EngineOptions) -> anyhow::Result<Self> {
        let mut registry = SchemaRegistry::new().with_options(options);

        let person = declare_person(&mut registry)?;
        let person = registry
            .finalize_object_schema(person)?
            .context("Person schema failed to compile")?;

        let catalog = declare_catalog(&mut registry)?;
        registry.finalize_method_schema(catalog, "search")?;
        let search = registry.intercept(catalog, "search", search_target);
        if !search.is_validating() {
            anyhow::bail!("{} is not validating", search.label());
        }

        Ok(Self {
            person,
            search,
            warnings: registry.diagnostics().len(),
        })
    }
}

fn declare_person(registry: &mut SchemaRegistry) -> anyhow::Result<ClassId> {
    let address = registry.register_class("Address");
    registry.declare_prop(address, Field::of::<String>("city").trim().min_length(1))?;
    registry.declare_prop(
        address,
        Field::of::<String>("zip")
            .pattern("^[0-9]{5}$")
            .nullable(),
    )?;

    let person = registry.register_class("Person");
    registry.declare_prop(
        person,
        Field::of::<String>("name").trim().min_length(1).max_length(64),
    )?;
    registry.declare_prop(person, Field::of::<u32>("age").minimum(0).maximum(150))?;
    registry.declare_prop(
        person,
        Field::of::<String>("email")
            .trim()
            .to_lower_case()
            .format("email")
            .message("must be a valid email address"),
    )?;
    registry.declare_prop(
        person,
        Field::of::<String>("role")
            .one_of(["admin", "member"])
            .nullable()
            .default_value("member"),
    )?;
    registry.declare_prop(person, Field::new("address").ty(address).nullable())?;
    Ok(person)
}

fn declare_catalog(registry: &mut SchemaRegistry) -> anyhow::Result<ClassId> {
    let catalog = registry.register_class("Catalog");
    registry.register_signature(catalog, "search", SEARCH_SIGNATURE)?;
    registry.declare_arg(catalog, "search", Param::of::<String>(0).one_of(CATEGORIES))?;
    registry.declare_arg(
        catalog,
        "search",
        Param::of::<String>(1).trim().to_lower_case().min_length(2),
    )?;
    registry.declare_arg(
        catalog,
        "search",
        Param::of::<Vec<String>>(2)
            .array_item(SchemaType::String)
            .max_items(5)
            .nullable()
            .default_value(json!([])),
    )?;
    Ok(catalog)
}

fn search_target(args: Vec<Value>) -> Result<SearchQuery, ApiError> {
    let mut args = args.into_iter();
    let category = args.next().unwrap_or_default();
    let keyword = args.next().unwrap_or_default();
    let tags = args.next().unwrap_or_default();
    serde_json::from_value(json!({"category": category, "keyword": keyword, "tags": tags}))
        .map_err(|err| ApiError::Internal(err.to_string()))
}

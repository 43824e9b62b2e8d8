//! Custom-resource metric engine (spec 4.G): compiles a declarative YAML
//! configuration into the same `Family<T>` generator shape the built-in
//! resource kinds use, over `kube::api::DynamicObject` instead of a typed
//! Kubernetes object.

pub mod coerce;
pub mod compiler;
pub mod config;
pub mod errors;
pub mod expr;

pub use compiler::compile_resource;
pub use config::{GeneratorConfig, ResourceConfig, SpecConfig, TopLevelConfig, load_file, load_str};

//! # Fixture Compiler
//!
//! An in-process [`CatalogCompiler`] that needs no toolchain. It emits a
//! catalog containing the module's class, any configured extra resources,
//! and a containment edge from the class to each of them.
//!
//! Platforms can be configured to fail with a chosen
//! [`CompilationFailure`] or to never answer, which is how isolation,
//! timeout, and cancellation behavior is exercised without a real
//! compiler.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use cmx_core::{
    normalize_type_name, CompilationError, CompilationFailure, CompiledCatalog, Edge,
    ModuleInvocation, Resource,
};

use crate::CatalogCompiler;

/// Deterministic compiler for tests and dry runs.
#[derive(Debug, Default)]
pub struct FixtureCompiler {
    extra_resources: Vec<Resource>,
    failures: HashMap<String, CompilationFailure>,
    hangs: HashSet<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FixtureCompiler {
    /// A compiler that succeeds for every platform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource to every produced catalog.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.extra_resources.push(resource);
        self
    }

    /// Fail compilation for one platform.
    pub fn fail_on(mut self, os: impl Into<String>, reason: CompilationFailure) -> Self {
        self.failures.insert(os.into(), reason);
        self
    }

    /// Never finish compiling for one platform.
    pub fn hang_on(mut self, os: impl Into<String>) -> Self {
        self.hangs.insert(os.into());
        self
    }

    /// Sleep before answering, for every platform.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `compile` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogCompiler for FixtureCompiler {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn compile(
        &self,
        invocation: &ModuleInvocation,
    ) -> Result<CompiledCatalog, CompilationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let os = invocation.os.as_str();

        if self.hangs.contains(os) {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.failures.get(os) {
            return Err(invocation.failed(reason.clone()));
        }

        let class = Resource::new("Class", normalize_type_name(invocation.module.as_str()));
        let class_ref = class.reference();
        let edges = self
            .extra_resources
            .iter()
            .map(|r| Edge {
                source: class_ref.clone(),
                target: r.reference(),
            })
            .collect();

        let mut resources = Vec::with_capacity(self.extra_resources.len() + 1);
        resources.push(class);
        resources.extend(self.extra_resources.iter().cloned());

        Ok(CompiledCatalog::new(os, resources, edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmx_core::{ModuleName, OsEntry, OsId, Parameters, ResourceRef};
    use serde_json::json;

    fn invocation(module: &str, os: &str) -> ModuleInvocation {
        let entry = OsEntry::new(OsId::new(os).unwrap(), Default::default());
        ModuleInvocation::for_entry(
            &ModuleName::new(module).unwrap(),
            &Parameters::defaults(),
            &entry,
        )
    }

    #[tokio::test]
    async fn emits_class_for_module() {
        let compiler = FixtureCompiler::new();
        let catalog = compiler
            .compile(&invocation("tensor::config", "centos-7"))
            .await
            .unwrap();
        assert_eq!(catalog.name, "centos-7");
        assert_eq!(catalog.classes(), vec!["Tensor::Config"]);
        assert_eq!(compiler.calls(), 1);
    }

    #[tokio::test]
    async fn extra_resources_are_contained_by_class() {
        let compiler = FixtureCompiler::new()
            .with_resource(Resource::new("Package", "tensor").with_parameter("ensure", json!("installed")));
        let catalog = compiler.compile(&invocation("tensor", "centos-7")).await.unwrap();
        let package = ResourceRef::new("Package", "tensor");
        assert!(catalog.contains(&package));
        assert!(catalog.has_edge(&ResourceRef::class("tensor"), &package));
    }

    #[tokio::test]
    async fn configured_failures_are_per_platform() {
        let compiler = FixtureCompiler::new().fail_on("ubuntu-20.04", CompilationFailure::Cancelled);
        assert!(compiler.compile(&invocation("tensor", "centos-7")).await.is_ok());
        let err = compiler
            .compile(&invocation("tensor", "ubuntu-20.04"))
            .await
            .unwrap_err();
        assert_eq!(err.reason, CompilationFailure::Cancelled);
        assert_eq!(compiler.calls(), 2);
    }
}

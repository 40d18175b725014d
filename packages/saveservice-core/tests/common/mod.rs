//! Shared setup for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use saveservice_core::catalog::TypeCatalog;
use saveservice_core::converter::{HTTP_SAMPLE_RESULT_TYPE, SAMPLE_RESULT_TYPE};
use saveservice_core::migration::MigrationTable;
use saveservice_core::{SaveService, SaveServiceConfig};

pub const TEST_PLAN: &str = "org.apache.jmeter.testelement.TestPlan";
pub const THREAD_GROUP: &str = "org.apache.jmeter.threads.ThreadGroup";
pub const LOOP_CONTROLLER: &str = "org.apache.jmeter.control.LoopController";
pub const HTTP_SAMPLER: &str = "org.apache.jmeter.protocol.http.sampler.HTTPSamplerProxy";
pub const ARGUMENTS: &str = "org.apache.jmeter.config.Arguments";
pub const ARGUMENT: &str = "org.apache.jmeter.config.Argument";
pub const HTTP_ARGUMENT: &str = "org.apache.jmeter.protocol.http.util.HTTPArgument";
pub const RESPONSE_ASSERTION: &str = "org.apache.jmeter.assertions.ResponseAssertion";
pub const ASSERTION_RESULT: &str = "org.apache.jmeter.assertions.AssertionResult";

/// Workspace root, where `bin/` lives.
pub fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Types the tests can decode.
pub fn catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::with_builtin_types();
    catalog.register_all([
        TEST_PLAN,
        THREAD_GROUP,
        LOOP_CONTROLLER,
        HTTP_SAMPLER,
        ARGUMENTS,
        ARGUMENT,
        HTTP_ARGUMENT,
        RESPONSE_ASSERTION,
        ASSERTION_RESULT,
    ]);
    catalog.register_custom(SAMPLE_RESULT_TYPE).unwrap();
    catalog.register_custom(HTTP_SAMPLE_RESULT_TYPE).unwrap();
    catalog
}

pub fn config() -> SaveServiceConfig {
    SaveServiceConfig {
        home: repo_root(),
        application_version: "5.6.3".to_string(),
        ..Default::default()
    }
}

/// Service initialized from the shipped definitions and upgrade table.
pub fn service() -> SaveService {
    let migrations = MigrationTable::from_file(&repo_root().join("bin/upgrade.properties")).unwrap();
    SaveService::builder(config())
        .catalog(catalog())
        .migrator(Arc::new(migrations))
        .load()
        .unwrap()
}

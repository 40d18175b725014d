//! Initialization from definition files: integrity, collisions, converters, audit.

mod common;

use std::fs;
use std::sync::Arc;

use ntest::timeout;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use saveservice_core::alias::AliasCollision;
use saveservice_core::catalog::TypeCatalog;
use saveservice_core::config::{EXPECTED_DEFINITIONS_CHECKSUM, EXPECTED_DEFINITIONS_VERSION};
use saveservice_core::integrity::{checksum_file, IntegrityWarning};
use saveservice_core::migration::MigrationTable;
use saveservice_core::{SaveError, SaveService, SaveServiceConfig};

use common::*;

fn config_for(dir: &std::path::Path) -> SaveServiceConfig {
    SaveServiceConfig {
        home: dir.to_path_buf(),
        definitions_file: "saveservice.properties".into(),
        expected_checksum: None,
        ..Default::default()
    }
}

#[timeout(1000)]
#[test]
fn test_shipped_definitions_match_expected_markers() {
    let path = repo_root().join("bin/saveservice.properties");
    assert_eq!(checksum_file(&path).unwrap(), EXPECTED_DEFINITIONS_CHECKSUM);

    let service = service();
    assert_eq!(service.declared_version(), EXPECTED_DEFINITIONS_VERSION);
    assert!(service.integrity_warnings().is_empty());
    assert!(service.alias_collisions().is_empty());
    assert!(service.converter_errors().is_empty());
    assert_eq!(service.file_encoding_or("ISO-8859-1"), "UTF-8");
}

#[timeout(1000)]
#[test]
fn test_checksum_ignores_line_endings_of_the_file() {
    let dir = tempdir().unwrap();
    let original = fs::read_to_string(repo_root().join("bin/saveservice.properties")).unwrap();
    let path = dir.path().join("saveservice.properties");
    fs::write(&path, original.replace('\n', "\r\n")).unwrap();

    assert_eq!(checksum_file(&path).unwrap(), EXPECTED_DEFINITIONS_CHECKSUM);
}

#[timeout(1000)]
#[test]
fn test_edited_definitions_warn_but_load() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("saveservice.properties"),
        "_version=3.9\nTestPlan=org.apache.jmeter.testelement.TestPlan\n",
    )
    .unwrap();

    let config = SaveServiceConfig {
        expected_checksum: Some(EXPECTED_DEFINITIONS_CHECKSUM.to_string()),
        ..config_for(dir.path())
    };
    let service = SaveService::load(config).unwrap();

    let warnings = service.integrity_warnings();
    assert_eq!(warnings.len(), 2);
    assert_eq!(
        warnings[0],
        IntegrityWarning::VersionMismatch {
            expected: "4.0".to_string(),
            found: "3.9".to_string(),
        }
    );
    assert!(matches!(warnings[1], IntegrityWarning::ChecksumMismatch { .. }));
    assert_eq!(service.alias_to_type("TestPlan"), TEST_PLAN);
}

#[timeout(1000)]
#[test]
fn test_missing_definitions_are_fatal() {
    let dir = tempdir().unwrap();
    let err = SaveService::load(config_for(dir.path())).unwrap_err();
    assert!(matches!(err, SaveError::Initialization(_)));
    assert!(err.to_string().contains("saveservice.properties"));
}

#[timeout(1000)]
#[test]
fn test_each_duplicate_is_recorded_once() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("saveservice.properties"),
        "_version=4.0\n\
         Widget=org.example.OldWidget\n\
         Widget2,Gadget=org.example.NewWidget\n\
         Gadget2,Widget=org.example.Thing\n",
    )
    .unwrap();

    let service = SaveService::load(config_for(dir.path())).unwrap();

    // `Widget` is claimed twice; last write wins
    assert_eq!(service.alias_to_type("Widget"), "org.example.Thing");
    assert_eq!(
        service.alias_collisions(),
        &[AliasCollision::DuplicateType {
            alias: "Widget".to_string(),
            type_id: "org.example.Thing".to_string(),
            previous: "org.example.OldWidget".to_string(),
        }]
    );
    assert_eq!(service.type_to_alias("org.example.OldWidget"), "Widget");
    assert_eq!(service.type_to_alias("org.example.Thing"), "Gadget2");
}

#[timeout(1000)]
#[test]
fn test_bad_converter_entries_are_skipped() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("saveservice.properties"),
        "_version=4.0\n\
         _file_version=1.23\n\
         jmeterTestPlan=org.apache.jmeter.save.ScriptWrapper\n\
         hashTree=org.apache.jorphan.collections.ListedHashTree\n\
         _org.example.NoSuchConverter=collection\n\
         _org.apache.jmeter.save.converters.HashTreeConverter=plain\n\
         _org.apache.jmeter.save.converters.SampleResultConverter=collection\n",
    )
    .unwrap();

    let service = SaveService::load(config_for(dir.path())).unwrap();
    let failed: Vec<_> = service
        .converter_errors()
        .iter()
        .map(|e| match e {
            SaveError::ConverterRegistration { converter, .. } => converter.as_str(),
            other => panic!("unexpected error {other:?}"),
        })
        .collect();
    assert_eq!(
        failed,
        vec![
            "org.example.NoSuchConverter",
            "org.apache.jmeter.save.converters.HashTreeConverter",
        ]
    );

    // Built-in tree handling still works without the definition entry
    let mut out = Vec::new();
    service
        .save_document(&saveservice_core::PlanTree::new(), &mut out)
        .unwrap();
    assert!(service.load_document(out.as_slice()).unwrap().is_empty());
}

#[timeout(1000)]
#[test]
fn test_audit_reports_unknown_types_only() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("saveservice.properties"),
        "_version=4.0\n\
         TestPlan=org.apache.jmeter.testelement.TestPlan\n\
         Legacy=org.example.LegacySampler\n\
         Zombie=org.example.RemovedLongAgo\n\
         Another=org.example.AlsoGone\n",
    )
    .unwrap();

    let migrations = MigrationTable::from_pairs([("org.example.LegacySampler", HTTP_SAMPLER)]);
    let mut catalog = TypeCatalog::with_builtin_types();
    catalog.register(TEST_PLAN).unwrap();
    catalog.register(HTTP_SAMPLER).unwrap();

    let service = SaveService::builder(config_for(dir.path()))
        .catalog(catalog)
        .migrator(Arc::new(migrations))
        .load()
        .unwrap();

    assert_eq!(
        service.audit_registered_types(),
        vec![
            "org.example.AlsoGone".to_string(),
            "org.example.RemovedLongAgo".to_string(),
        ]
    );
}

#[timeout(1000)]
#[test]
fn test_declared_file_encoding_is_used() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("saveservice.properties"),
        "_version=4.0\n\
         _file_encoding=windows-1252\n\
         jmeterTestPlan=org.apache.jmeter.save.ScriptWrapper\n\
         hashTree=org.apache.jorphan.collections.ListedHashTree\n\
         TestPlan=org.apache.jmeter.testelement.TestPlan\n",
    )
    .unwrap();

    let service = SaveService::builder(config_for(dir.path()))
        .catalog(catalog())
        .load()
        .unwrap();
    assert_eq!(service.resolve_file_encoding().unwrap().name(), "windows-1252");

    let mut tree = saveservice_core::PlanTree::new();
    tree.add(saveservice_core::Object::new(TEST_PLAN).with_field("testname", "Caf\u{e9}"));

    let path = dir.path().join("plan.jmx");
    let mut file = fs::File::create(&path).unwrap();
    service.save_document(&tree, &mut file).unwrap();
    drop(file);

    let bytes = fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"<?xml version=\"1.0\" encoding=\"windows-1252\"?>\n"));
    assert!(bytes.windows(4).any(|w| w == b"Caf\xe9"));
    assert_eq!(service.load_document_file(&path).unwrap(), tree);
}

#[timeout(1000)]
#[test]
fn test_unknown_file_encoding_fails_calls() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("saveservice.properties"),
        "_version=4.0\n_file_encoding=EBCDIC-FANTASY\n",
    )
    .unwrap();

    let service = SaveService::load(config_for(dir.path())).unwrap();
    assert_eq!(service.file_encoding_or("UTF-8"), "EBCDIC-FANTASY");
    assert!(matches!(
        service.resolve_file_encoding(),
        Err(SaveError::Encoding(_))
    ));
    assert!(matches!(
        service.begin_record_log(&mut Vec::new()),
        Err(SaveError::Encoding(_))
    ));
}

//! Alias-based XML save service for test plans and result logs.
//!
//! Provides the alias registry, definition integrity checks, historic name
//! migration, and tree and streaming marshalling.

pub mod alias;
pub mod audit;
pub mod catalog;
pub mod charset;
pub mod codec;
pub mod config;
pub mod converter;
pub mod definitions;
pub mod error;
pub mod integrity;
pub mod io_utils;
pub mod mapper;
pub mod marshaller;
pub mod migration;
pub mod model;
pub mod service;
pub mod xml;

pub use codec::{FnRecordSink, RecordContext, RecordSink};
pub use config::SaveServiceConfig;
pub use error::SaveError;
pub use model::{Object, PlanTree, SampleEvent, Value};
pub use service::{SaveService, SaveServiceBuilder, ServiceReport};

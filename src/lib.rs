//! Sample SOAP service
//!
//! Serves three operations over SOAP 1.1 and 1.2:
//!
//! - `Test` returns its string argument unchanged
//! - `XmlMethod` logs an XML fragment and returns nothing
//! - `EchoModel` returns a [`CustomModel`] unchanged
//!
//! The operations are declared by the [`SampleContract`] trait and described
//! as data by [`ServiceContract`], which drives request routing and WSDL
//! generation.
//!
//! # Example
//!
//! ```ignore
//! use soap_sample_service::{server, SampleService, ServiceConfig, SoapEndpoint};
//! use std::sync::Arc;
//!
//! let endpoint = Arc::new(SoapEndpoint::new(ServiceConfig::default(), SampleService));
//! server::serve(endpoint, shutdown_signal()).await?;
//! ```

pub mod config;
pub mod contract;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod model;
pub mod server;
pub mod service;
pub mod wsdl;
pub mod xml;

pub use config::ServiceConfig;
pub use contract::{SampleContract, ServiceContract};
pub use endpoint::{SoapEndpoint, SoapRequest, SoapResponse};
pub use error::SoapError;
pub use model::CustomModel;
pub use service::SampleService;
pub use xml::XmlElement;

//! Configuration types for the sample SOAP service.

use serde::{Deserialize, Serialize};

/// Main configuration for the sample SOAP service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Config version
    pub version: String,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Contract naming (service name and XML namespace)
    pub contract: ContractConfig,

    /// Request handling settings
    pub settings: SettingsConfig,

    /// Envelope parsing limits
    pub limits: LimitsConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            server: ServerConfig::default(),
            contract: ContractConfig::default(),
            settings: SettingsConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub listen: String,

    /// Path the SOAP endpoint is mounted at
    pub path: String,

    /// Externally visible endpoint URL advertised in the WSDL.
    /// When unset, the address is derived from the request's Host header.
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:5000".to_string(),
            path: "/Service.asmx".to_string(),
            public_url: None,
        }
    }
}

/// Service contract naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    /// Contract (port type) name; part of every SOAP action
    pub name: String,

    /// Name of the `wsdl:service` element
    pub service_name: String,

    /// Target XML namespace of operations and types
    pub namespace: String,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            name: "ISampleService".to_string(),
            service_name: "SampleService".to_string(),
            namespace: "http://tempuri.org/".to_string(),
        }
    }
}

/// Request handling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Maximum request body size (bytes)
    pub max_body_size: usize,

    /// Add debug headers (X-Soap-*) to responses
    pub debug_headers: bool,

    /// Allowed Content-Type headers for SOAP requests
    pub allowed_content_types: Vec<String>,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1_048_576, // 1MB
            debug_headers: false,
            allowed_content_types: vec![
                "text/xml".to_string(),
                "application/soap+xml".to_string(),
                "application/xml".to_string(),
            ],
        }
    }
}

/// Envelope parsing limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum element nesting depth, counted from the Envelope
    pub max_depth: u32,

    /// Maximum number of elements in a request
    pub max_elements: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_elements: 10_000,
        }
    }
}

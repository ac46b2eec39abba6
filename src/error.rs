//! Error types and SOAP Fault generation.

use crate::envelope::SoapVersion;
use quick_xml::escape::escape;
use thiserror::Error;

/// Errors raised at the service boundary, before or after an operation runs.
///
/// The operations themselves cannot fail; every variant describes a request
/// that could not be turned into a call.
#[derive(Error, Debug)]
pub enum SoapError {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("Invalid SOAP envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Unsupported SOAP envelope namespace: {0}")]
    VersionMismatch(String),

    #[error("Header not understood: {0}")]
    MustUnderstand(String),

    #[error("DOCTYPE and entity declarations are not allowed")]
    DoctypeDetected,

    #[error("Request exceeds limit: {0}")]
    LimitExceeded(String),

    #[error("Request body exceeds {max} bytes")]
    BodyTooLarge { max: usize },

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("No operation matches element '{0}'")]
    UnknownOperation(String),

    #[error("SOAPAction '{action}' does not match operation '{operation}'")]
    ActionMismatch { action: String, operation: String },

    #[error("Missing parameter '{0}'")]
    MissingParameter(String),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for SoapError {
    fn from(e: quick_xml::Error) -> Self {
        SoapError::XmlParse(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SoapError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        SoapError::XmlParse(e.to_string())
    }
}

impl SoapError {
    /// The SOAP fault code this error is reported with.
    pub fn fault_code(&self) -> FaultCode {
        match self {
            Self::VersionMismatch(_) => FaultCode::VersionMismatch,
            Self::MustUnderstand(_) => FaultCode::MustUnderstand,
            Self::Config(_) | Self::Io(_) => FaultCode::Server,
            _ => FaultCode::Client,
        }
    }
}

/// SOAP fault codes, named after their SOAP 1.1 spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    /// The envelope namespace was not recognized
    VersionMismatch,
    /// A mandatory header was not understood
    MustUnderstand,
    /// The request was at fault (SOAP 1.2: Sender)
    Client,
    /// The service was at fault (SOAP 1.2: Receiver)
    Server,
}

impl FaultCode {
    /// Local name of the code in the given SOAP version.
    pub fn as_str(&self, version: SoapVersion) -> &'static str {
        match (self, version) {
            (Self::VersionMismatch, _) => "VersionMismatch",
            (Self::MustUnderstand, _) => "MustUnderstand",
            (Self::Client, SoapVersion::Soap11) => "Client",
            (Self::Client, SoapVersion::Soap12) => "Sender",
            (Self::Server, SoapVersion::Soap11) => "Server",
            (Self::Server, SoapVersion::Soap12) => "Receiver",
        }
    }

    /// Whether this is the generic sender fault (HTTP 400 under SOAP 1.2).
    pub fn is_sender_fault(&self) -> bool {
        matches!(self, Self::Client)
    }
}

/// Generate a SOAP Fault envelope for an error.
pub fn soap_fault_response(error: &SoapError, version: SoapVersion) -> String {
    let code = error.fault_code().as_str(version);
    let reason = error.to_string();
    match version {
        SoapVersion::Soap11 => soap_11_fault(code, &reason),
        SoapVersion::Soap12 => soap_12_fault(code, &reason),
    }
}

fn soap_11_fault(code: &str, reason: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <soap:Fault>
      <faultcode>soap:{}</faultcode>
      <faultstring>{}</faultstring>
    </soap:Fault>
  </soap:Body>
</soap:Envelope>"#,
        code,
        escape(reason)
    )
}

fn soap_12_fault(code: &str, reason: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">
  <soap:Body>
    <soap:Fault>
      <soap:Code>
        <soap:Value>soap:{}</soap:Value>
      </soap:Code>
      <soap:Reason>
        <soap:Text xml:lang="en">{}</soap:Text>
      </soap:Reason>
    </soap:Fault>
  </soap:Body>
</soap:Envelope>"#,
        code,
        escape(reason)
    )
}

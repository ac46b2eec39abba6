//! SOAP envelope parsing and writing.

use crate::error::SoapError;
use crate::xml::{parse_document, ParseLimits, XmlElement};

/// SOAP namespace URIs.
pub const SOAP_11_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_12_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// SOAP versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapVersion {
    /// SOAP 1.1 (namespace: http://schemas.xmlsoap.org/soap/envelope/)
    Soap11,
    /// SOAP 1.2 (namespace: http://www.w3.org/2003/05/soap-envelope)
    Soap12,
}

impl SoapVersion {
    /// Envelope namespace URI.
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Soap11 => SOAP_11_NS,
            Self::Soap12 => SOAP_12_NS,
        }
    }

    /// Response Content-Type.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Soap11 => "text/xml; charset=utf-8",
            Self::Soap12 => "application/soap+xml; charset=utf-8",
        }
    }

    /// Short label used in logs and debug headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Soap11 => "1.1",
            Self::Soap12 => "1.2",
        }
    }

    /// Guess the version from a request Content-Type, for faults raised
    /// before the envelope could be read.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.to_ascii_lowercase().contains("application/soap+xml") => Self::Soap12,
            _ => Self::Soap11,
        }
    }
}

/// Parsed SOAP envelope.
#[derive(Debug, Clone)]
pub struct SoapEnvelope {
    /// Detected SOAP version
    pub version: SoapVersion,
    /// SOAP Header (if present)
    pub header: Option<XmlElement>,
    /// SOAP Body
    pub body: XmlElement,
}

impl SoapEnvelope {
    /// First element inside the Body, naming the operation.
    pub fn operation_element(&self) -> Option<&XmlElement> {
        self.body.elements().next()
    }

    /// Header entries flagged `mustUnderstand` in the envelope's namespace.
    pub fn must_understand_headers(&self) -> Vec<&XmlElement> {
        let Some(header) = &self.header else {
            return Vec::new();
        };
        let ns = self.version.namespace();
        header
            .elements()
            .filter(|e| {
                matches!(e.attribute_ns(ns, "mustUnderstand"), Some(v) if v == "1" || v == "true")
            })
            .collect()
    }
}

/// Parse raw bytes as SOAP envelope.
pub fn parse_soap_envelope(data: &[u8], limits: ParseLimits) -> Result<SoapEnvelope, SoapError> {
    let xml_str = std::str::from_utf8(data)
        .map_err(|e| SoapError::XmlParse(format!("Invalid UTF-8: {}", e)))?;

    // Pre-scan for XXE patterns before handing the text to the reader
    check_xxe_patterns(xml_str)?;

    let root = parse_document(xml_str, limits)?;

    if root.local_name != "Envelope" {
        return Err(SoapError::InvalidEnvelope(format!(
            "root element is '{}', expected 'Envelope'",
            root.local_name
        )));
    }
    let version = match root.namespace.as_deref() {
        Some(SOAP_11_NS) => SoapVersion::Soap11,
        Some(SOAP_12_NS) => SoapVersion::Soap12,
        other => {
            return Err(SoapError::VersionMismatch(
                other.unwrap_or("(none)").to_string(),
            ))
        }
    };

    let mut header = None;
    let mut body = None;
    for child in root.elements() {
        if child.namespace.as_deref() != Some(version.namespace()) {
            continue;
        }
        match child.local_name.as_str() {
            "Header" if header.is_none() && body.is_none() => header = Some(child.clone()),
            "Body" if body.is_none() => body = Some(child.clone()),
            _ => {}
        }
    }

    let body = body.ok_or_else(|| SoapError::InvalidEnvelope("missing Body".to_string()))?;

    Ok(SoapEnvelope {
        version,
        header,
        body,
    })
}

/// Check for XXE attack patterns.
fn check_xxe_patterns(xml: &str) -> Result<(), SoapError> {
    if xml.contains("<!DOCTYPE")
        || xml.contains("<!doctype")
        || xml.contains("<!ENTITY")
        || xml.contains("<!entity")
    {
        return Err(SoapError::DoctypeDetected);
    }
    Ok(())
}

/// Extract SOAPAction from HTTP header value (removes quotes).
pub fn parse_soap_action(header_value: &str) -> String {
    header_value.trim().trim_matches('"').to_string()
}

/// Extract the `action` parameter of a SOAP 1.2 Content-Type.
pub fn action_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("action")
            .then(|| parse_soap_action(value))
    })
}

/// Wrap serialized body content in an envelope of the given version.
pub fn write_envelope(version: SoapVersion, body_content: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="{}">
  <soap:Body>
    {}
  </soap:Body>
</soap:Envelope>"#,
        version.namespace(),
        body_content
    )
}

//! SOAP endpoint: turns raw requests into operation calls and responses.
//!
//! Transport agnostic; the HTTP server in [`crate::server`] feeds it the
//! body and the two headers it cares about.

use crate::config::ServiceConfig;
use crate::contract::{OperationDescriptor, OperationKind, SampleContract, ServiceContract};
use crate::envelope::{
    action_from_content_type, parse_soap_action, parse_soap_envelope, write_envelope,
    SoapEnvelope, SoapVersion,
};
use crate::error::{soap_fault_response, SoapError};
use crate::model::CustomModel;
use crate::xml::{escape_text, ParseLimits, XmlElement};
use quick_xml::escape::escape;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// The parts of an incoming request the endpoint reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoapRequest<'a> {
    /// Content-Type header
    pub content_type: Option<&'a str>,
    /// SOAPAction header (SOAP 1.1)
    pub soap_action: Option<&'a str>,
    /// Raw request body
    pub body: &'a [u8],
}

/// A response ready to be written to the transport.
#[derive(Debug, Clone)]
pub struct SoapResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Type header
    pub content_type: &'static str,
    /// Extra headers (debug headers only)
    pub headers: Vec<(String, String)>,
    /// Envelope text
    pub body: String,
    /// Whether the body is a SOAP Fault
    pub is_fault: bool,
}

/// Snapshot of endpoint counters.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointMetrics {
    pub requests_processed: u64,
    pub faults_returned: u64,
    pub operations: Vec<OperationCount>,
}

/// Invocation count of one operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationCount {
    pub operation: &'static str,
    pub invocations: u64,
}

/// SOAP endpoint serving a [`SampleContract`] implementation.
pub struct SoapEndpoint<S> {
    config: ServiceConfig,
    contract: ServiceContract,
    service: S,
    /// Metrics tracking
    requests_processed: AtomicU64,
    faults_returned: AtomicU64,
    invocations: [AtomicU64; 3],
}

impl<S: SampleContract> SoapEndpoint<S> {
    /// Create an endpoint for the given configuration and service.
    pub fn new(config: ServiceConfig, service: S) -> Self {
        let contract = ServiceContract::from_config(&config.contract);
        Self {
            config,
            contract,
            service,
            requests_processed: AtomicU64::new(0),
            faults_returned: AtomicU64::new(0),
            invocations: Default::default(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn contract(&self) -> &ServiceContract {
        &self.contract
    }

    /// Current counter values.
    pub fn metrics(&self) -> EndpointMetrics {
        EndpointMetrics {
            requests_processed: self.requests_processed.load(Ordering::Relaxed),
            faults_returned: self.faults_returned.load(Ordering::Relaxed),
            operations: OperationKind::ALL
                .iter()
                .map(|kind| OperationCount {
                    operation: kind.name(),
                    invocations: self.invocations[kind.index()].load(Ordering::Relaxed),
                })
                .collect(),
        }
    }

    /// Check if Content-Type is valid for SOAP. A missing header is accepted.
    fn is_valid_content_type(&self, content_type: Option<&str>) -> bool {
        match content_type {
            Some(ct) => {
                let ct_lower = ct.to_lowercase();
                self.config
                    .settings
                    .allowed_content_types
                    .iter()
                    .any(|allowed| ct_lower.contains(&allowed.to_lowercase()))
            }
            None => true,
        }
    }

    fn limits(&self) -> ParseLimits {
        ParseLimits {
            max_depth: self.config.limits.max_depth,
            max_elements: self.config.limits.max_elements,
        }
    }

    /// Handle one SOAP request.
    pub async fn handle(&self, request: SoapRequest<'_>) -> SoapResponse {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);

        debug!(
            content_type = ?request.content_type,
            soap_action = ?request.soap_action,
            body_size = request.body.len(),
            "Processing SOAP request"
        );

        // Until the envelope is read, answer in the version the Content-Type suggests
        let fallback_version = SoapVersion::from_content_type(request.content_type);

        let max_size = self.config.settings.max_body_size;
        if request.body.len() > max_size {
            warn!(
                body_size = request.body.len(),
                max_size, "SOAP body too large"
            );
            return self.fault(&SoapError::BodyTooLarge { max: max_size }, fallback_version);
        }

        if !self.is_valid_content_type(request.content_type) {
            warn!(content_type = ?request.content_type, "Unsupported content type");
            let error =
                SoapError::UnsupportedContentType(request.content_type.unwrap_or_default().to_string());
            return self.fault(&error, fallback_version);
        }

        let envelope = match parse_soap_envelope(request.body, self.limits()) {
            Ok(env) => env,
            Err(error) => {
                warn!(error = %error, "SOAP parsing error");
                return self.fault(&error, fallback_version);
            }
        };

        let soap_action = request
            .soap_action
            .map(parse_soap_action)
            .or_else(|| request.content_type.and_then(action_from_content_type))
            .filter(|action| !action.is_empty());

        match self.dispatch(&envelope, soap_action.as_deref()).await {
            Ok((operation, body)) => {
                debug!(
                    operation = operation.name,
                    soap_version = envelope.version.as_str(),
                    "SOAP request completed"
                );
                let mut headers = Vec::new();
                if self.config.settings.debug_headers {
                    headers.push(("X-Soap-Operation".to_string(), operation.name.to_string()));
                    headers.push((
                        "X-Soap-Version".to_string(),
                        envelope.version.as_str().to_string(),
                    ));
                }
                SoapResponse {
                    status: 200,
                    content_type: envelope.version.content_type(),
                    headers,
                    body: write_envelope(envelope.version, &body),
                    is_fault: false,
                }
            }
            Err(error) => {
                warn!(error = %error, "SOAP request rejected");
                self.fault(&error, envelope.version)
            }
        }
    }

    /// Resolve and invoke the operation named by the envelope.
    async fn dispatch(
        &self,
        envelope: &SoapEnvelope,
        soap_action: Option<&str>,
    ) -> Result<(&OperationDescriptor, String), SoapError> {
        if let Some(header) = envelope.must_understand_headers().first() {
            return Err(SoapError::MustUnderstand(header.name.clone()));
        }

        let element = envelope
            .operation_element()
            .ok_or_else(|| SoapError::InvalidEnvelope("empty Body".to_string()))?;

        let operation = self
            .contract
            .find_by_element(&element.local_name)
            .ok_or_else(|| SoapError::UnknownOperation(element.local_name.clone()))?;

        if let Some(action) = soap_action {
            if !operation.matches_action(action) {
                return Err(SoapError::ActionMismatch {
                    action: action.to_string(),
                    operation: operation.name.to_string(),
                });
            }
        }

        let body = self.invoke(operation, element).await?;
        self.invocations[operation.kind.index()].fetch_add(1, Ordering::Relaxed);
        Ok((operation, body))
    }

    /// Decode the parameter, call the service and encode the response element.
    async fn invoke(
        &self,
        operation: &OperationDescriptor,
        element: &XmlElement,
    ) -> Result<String, SoapError> {
        let param_name = operation.input.name;
        let param = element
            .child_ignore_case(param_name)
            .ok_or_else(|| SoapError::MissingParameter(param_name.to_string()))?;

        let result = match operation.kind {
            OperationKind::Test => {
                let s = self.service.test(param.text()).await;
                Some(escape_text(&s).into_owned())
            }
            OperationKind::XmlMethod => {
                let mut elements = param.elements();
                let fragment = match (elements.next(), elements.next()) {
                    (Some(fragment), None) => fragment.clone(),
                    (None, _) => {
                        return Err(SoapError::InvalidParameter {
                            name: param_name.to_string(),
                            reason: "expected an XML element".to_string(),
                        })
                    }
                    (Some(_), Some(_)) => {
                        return Err(SoapError::InvalidParameter {
                            name: param_name.to_string(),
                            reason: "expected a single XML element".to_string(),
                        })
                    }
                };
                self.service.xml_method(fragment).await;
                None
            }
            OperationKind::EchoModel => {
                let model = CustomModel::from_xml(param)?;
                let echoed = self.service.echo_model(model).await;
                Some(echoed.to_xml_fields())
            }
        };

        let namespace = escape(self.contract.namespace.as_str());
        let response = operation.response_element();
        Ok(match result {
            Some(content) => {
                let result_element = operation.result_element();
                format!(
                    "<{response} xmlns=\"{namespace}\"><{result_element}>{content}</{result_element}></{response}>"
                )
            }
            None => format!("<{response} xmlns=\"{namespace}\" />"),
        })
    }

    /// Answer a request the transport refused before it reached [`Self::handle`].
    pub fn reject(&self, error: &SoapError, content_type: Option<&str>) -> SoapResponse {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
        warn!(error = %error, "SOAP request refused by transport");
        self.fault(error, SoapVersion::from_content_type(content_type))
    }

    fn fault(&self, error: &SoapError, version: SoapVersion) -> SoapResponse {
        self.faults_returned.fetch_add(1, Ordering::Relaxed);

        let code = error.fault_code();
        let status = match error {
            SoapError::BodyTooLarge { .. } => 413,
            SoapError::UnsupportedContentType(_) => 415,
            _ if version == SoapVersion::Soap12 && code.is_sender_fault() => 400,
            _ => 500,
        };

        info!(
            status,
            fault_code = code.as_str(version),
            soap_version = version.as_str(),
            "Returning SOAP fault"
        );

        let mut headers = Vec::new();
        if self.config.settings.debug_headers {
            headers.push(("X-Soap-Fault".to_string(), code.as_str(version).to_string()));
        }

        SoapResponse {
            status,
            content_type: version.content_type(),
            headers,
            body: soap_fault_response(error, version),
            is_fault: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingsConfig;
    use crate::service::SampleService;

    fn test_config() -> ServiceConfig {
        ServiceConfig {
            settings: SettingsConfig {
                debug_headers: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn endpoint() -> SoapEndpoint<SampleService> {
        SoapEndpoint::new(test_config(), SampleService)
    }

    fn soap11(body: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    {}
  </soap:Body>
</soap:Envelope>"#,
            body
        )
    }

    fn request<'a>(body: &'a str, soap_action: Option<&'a str>) -> SoapRequest<'a> {
        SoapRequest {
            content_type: Some("text/xml; charset=utf-8"),
            soap_action,
            body: body.as_bytes(),
        }
    }

    // --- Content type validation ---

    #[test]
    fn test_valid_content_type() {
        let endpoint = endpoint();
        assert!(endpoint.is_valid_content_type(Some("text/xml")));
        assert!(endpoint.is_valid_content_type(Some("application/soap+xml; charset=utf-8")));
        assert!(endpoint.is_valid_content_type(Some("TEXT/XML")));
        assert!(!endpoint.is_valid_content_type(Some("application/json")));
        assert!(endpoint.is_valid_content_type(None));
    }

    // --- Metrics ---

    #[test]
    fn test_metrics_initial_values() {
        let metrics = endpoint().metrics();
        assert_eq!(metrics.requests_processed, 0);
        assert_eq!(metrics.faults_returned, 0);
        assert_eq!(metrics.operations.len(), 3);
        assert!(metrics.operations.iter().all(|op| op.invocations == 0));
    }

    #[tokio::test]
    async fn test_metrics_count_requests_and_faults() {
        let endpoint = endpoint();
        let ok = soap11(r#"<Test xmlns="http://tempuri.org/"><s>x</s></Test>"#);
        endpoint.handle(request(&ok, None)).await;
        endpoint.handle(request("<broken", None)).await;

        let metrics = endpoint.metrics();
        assert_eq!(metrics.requests_processed, 2);
        assert_eq!(metrics.faults_returned, 1);
        let test = metrics.operations.iter().find(|op| op.operation == "Test").unwrap();
        assert_eq!(test.invocations, 1);
    }

    // --- Operations ---

    #[tokio::test]
    async fn test_test_operation_echoes() {
        let endpoint = endpoint();
        let body = soap11(r#"<Test xmlns="http://tempuri.org/"><s>hello</s></Test>"#);
        let response = endpoint.handle(request(&body, None)).await;

        assert_eq!(response.status, 200);
        assert!(!response.is_fault);
        assert_eq!(response.content_type, "text/xml; charset=utf-8");
        assert!(response
            .body
            .contains(r#"<TestResponse xmlns="http://tempuri.org/"><TestResult>hello</TestResult></TestResponse>"#));
    }

    #[tokio::test]
    async fn test_test_operation_escapes_result() {
        let endpoint = endpoint();
        let body = soap11(r#"<Test xmlns="http://tempuri.org/"><s>a &lt;b&gt; &amp; c</s></Test>"#);
        let response = endpoint.handle(request(&body, None)).await;
        assert!(response.body.contains("<TestResult>a &lt;b&gt; &amp; c</TestResult>"));
    }

    #[tokio::test]
    async fn test_empty_string_parameter() {
        let endpoint = endpoint();
        let body = soap11(r#"<Test xmlns="http://tempuri.org/"><s/></Test>"#);
        let response = endpoint.handle(request(&body, None)).await;
        assert_eq!(response.status, 200);
        assert!(response.body.contains("<TestResult></TestResult>"));
    }

    #[tokio::test]
    async fn test_xml_method_returns_empty_response() {
        let endpoint = endpoint();
        let body = soap11(r#"<XmlMethod xmlns="http://tempuri.org/"><xml><a><b/></a></xml></XmlMethod>"#);
        let response = endpoint.handle(request(&body, None)).await;

        assert_eq!(response.status, 200);
        assert!(response
            .body
            .contains(r#"<XmlMethodResponse xmlns="http://tempuri.org/" />"#));
    }

    #[tokio::test]
    async fn test_xml_method_requires_element() {
        let endpoint = endpoint();
        let body = soap11(r#"<XmlMethod xmlns="http://tempuri.org/"><xml>text</xml></XmlMethod>"#);
        let response = endpoint.handle(request(&body, None)).await;
        assert!(response.is_fault);
        assert_eq!(response.status, 500);
        assert!(response.body.contains("soap:Client"));
    }

    #[tokio::test]
    async fn test_xml_method_rejects_sibling_elements() {
        let endpoint = endpoint();
        let body = soap11(r#"<XmlMethod xmlns="http://tempuri.org/"><xml><a/><b/></xml></XmlMethod>"#);
        let response = endpoint.handle(request(&body, None)).await;
        assert!(response.is_fault);
        assert!(response.body.contains("single XML element"));
    }

    #[tokio::test]
    async fn test_test_operation_keeps_carriage_return() {
        let endpoint = endpoint();
        let body = soap11(r#"<Test xmlns="http://tempuri.org/"><s>a&#13;b</s></Test>"#);
        let response = endpoint.handle(request(&body, None)).await;
        assert_eq!(response.status, 200);
        assert!(!response.body.contains('\r'));
        assert!(response.body.contains("<TestResult>a&#13;b</TestResult>"));
    }

    #[tokio::test]
    async fn test_echo_model_keeps_carriage_return() {
        let endpoint = endpoint();
        let body = soap11(
            r#"<EchoModel xmlns="http://tempuri.org/"><inputModel><Id>2</Id><Name>x&#13;&#10;y</Name></inputModel></EchoModel>"#,
        );
        let response = endpoint.handle(request(&body, None)).await;
        assert_eq!(response.status, 200);
        assert!(!response.body.contains('\r'));
        assert!(response.body.contains("<Name>x&#13;\ny</Name>"));
    }

    #[tokio::test]
    async fn test_must_understand_in_foreign_namespace_ignored() {
        let endpoint = endpoint();
        let body = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Header><t:Tx xmlns:t="urn:tx" t:mustUnderstand="1">5</t:Tx></soap:Header>
  <soap:Body><Test xmlns="http://tempuri.org/"><s>x</s></Test></soap:Body>
</soap:Envelope>"#;
        let response = endpoint.handle(request(body, None)).await;
        assert_eq!(response.status, 200);
        assert!(!response.is_fault);
    }

    #[tokio::test]
    async fn test_echo_model() {
        let endpoint = endpoint();
        let body = soap11(
            r#"<EchoModel xmlns="http://tempuri.org/"><inputModel><Id>1</Id><Name>a</Name></inputModel></EchoModel>"#,
        );
        let response = endpoint.handle(request(&body, None)).await;
        assert_eq!(response.status, 200);
        assert!(response
            .body
            .contains("<EchoModelResult><Id>1</Id><Name>a</Name></EchoModelResult>"));
    }

    // --- Faults ---

    #[tokio::test]
    async fn test_missing_parameter_fault() {
        let endpoint = endpoint();
        let body = soap11(r#"<Test xmlns="http://tempuri.org/"/>"#);
        let response = endpoint.handle(request(&body, None)).await;
        assert!(response.is_fault);
        assert!(response.body.contains("Missing parameter"));
    }

    #[tokio::test]
    async fn test_unknown_operation_fault() {
        let endpoint = endpoint();
        let body = soap11(r#"<DeleteEverything xmlns="http://tempuri.org/"/>"#);
        let response = endpoint.handle(request(&body, None)).await;
        assert!(response.is_fault);
        assert!(response.body.contains("DeleteEverything"));
    }

    #[tokio::test]
    async fn test_empty_body_fault() {
        let endpoint = endpoint();
        let body = soap11("");
        let response = endpoint.handle(request(&body, None)).await;
        assert!(response.is_fault);
        assert!(response.body.contains("empty Body"));
    }

    #[tokio::test]
    async fn test_soap_action_header_matches() {
        let endpoint = endpoint();
        let body = soap11(r#"<Test xmlns="http://tempuri.org/"><s>x</s></Test>"#);
        let full = endpoint
            .handle(request(&body, Some("\"http://tempuri.org/ISampleService/Test\"")))
            .await;
        assert_eq!(full.status, 200);
        let bare = endpoint.handle(request(&body, Some("Test"))).await;
        assert_eq!(bare.status, 200);
        let empty = endpoint.handle(request(&body, Some("\"\""))).await;
        assert_eq!(empty.status, 200);
    }

    #[tokio::test]
    async fn test_soap_action_mismatch() {
        let endpoint = endpoint();
        let body = soap11(r#"<Test xmlns="http://tempuri.org/"><s>x</s></Test>"#);
        let response = endpoint
            .handle(request(&body, Some("http://tempuri.org/ISampleService/EchoModel")))
            .await;
        assert!(response.is_fault);
        assert!(response.body.contains("does not match"));
    }

    #[tokio::test]
    async fn test_body_too_large() {
        let mut config = test_config();
        config.settings.max_body_size = 100;
        let endpoint = SoapEndpoint::new(config, SampleService);
        let body = "x".repeat(200);
        let response = endpoint.handle(request(&body, None)).await;
        assert_eq!(response.status, 413);
        assert!(response.is_fault);
    }

    #[tokio::test]
    async fn test_unsupported_content_type() {
        let endpoint = endpoint();
        let body = soap11(r#"<Test xmlns="http://tempuri.org/"><s>x</s></Test>"#);
        let response = endpoint
            .handle(SoapRequest {
                content_type: Some("application/json"),
                soap_action: None,
                body: body.as_bytes(),
            })
            .await;
        assert_eq!(response.status, 415);
    }

    #[tokio::test]
    async fn test_must_understand_fault() {
        let endpoint = endpoint();
        let body = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Header><t:Tx xmlns:t="urn:tx" soap:mustUnderstand="1">5</t:Tx></soap:Header>
  <soap:Body><Test xmlns="http://tempuri.org/"><s>x</s></Test></soap:Body>
</soap:Envelope>"#;
        let response = endpoint.handle(request(body, None)).await;
        assert!(response.is_fault);
        assert!(response.body.contains("soap:MustUnderstand"));
    }

    #[tokio::test]
    async fn test_soap_12_request_gets_soap_12_response() {
        let endpoint = endpoint();
        let body = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">
  <soap:Body><Test xmlns="http://tempuri.org/"><s>v12</s></Test></soap:Body>
</soap:Envelope>"#;
        let response = endpoint
            .handle(SoapRequest {
                content_type: Some(
                    "application/soap+xml; charset=utf-8; action=\"http://tempuri.org/ISampleService/Test\"",
                ),
                soap_action: None,
                body: body.as_bytes(),
            })
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "application/soap+xml; charset=utf-8");
        assert!(response.body.contains("http://www.w3.org/2003/05/soap-envelope"));
    }

    #[tokio::test]
    async fn test_soap_12_sender_fault_is_400() {
        let endpoint = endpoint();
        let body = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">
  <soap:Body><Nope xmlns="http://tempuri.org/"/></soap:Body>
</soap:Envelope>"#;
        let response = endpoint
            .handle(SoapRequest {
                content_type: Some("application/soap+xml"),
                soap_action: None,
                body: body.as_bytes(),
            })
            .await;
        assert_eq!(response.status, 400);
        assert!(response.body.contains("soap:Sender"));
    }

    #[tokio::test]
    async fn test_version_mismatch_fault() {
        let endpoint = endpoint();
        let body = r#"<e:Envelope xmlns:e="urn:other"><e:Body/></e:Envelope>"#;
        let response = endpoint.handle(request(body, None)).await;
        assert_eq!(response.status, 500);
        assert!(response.body.contains("soap:VersionMismatch"));
    }

    // --- Debug headers ---

    #[tokio::test]
    async fn test_debug_headers() {
        let endpoint = endpoint();
        let body = soap11(r#"<Test xmlns="http://tempuri.org/"><s>x</s></Test>"#);
        let response = endpoint.handle(request(&body, None)).await;
        assert!(response
            .headers
            .iter()
            .any(|(k, v)| k == "X-Soap-Operation" && v == "Test"));
        assert!(response
            .headers
            .iter()
            .any(|(k, v)| k == "X-Soap-Version" && v == "1.1"));
    }

    #[tokio::test]
    async fn test_debug_headers_disabled() {
        let endpoint = SoapEndpoint::new(ServiceConfig::default(), SampleService);
        let body = soap11(r#"<Test xmlns="http://tempuri.org/"><s>x</s></Test>"#);
        let response = endpoint.handle(request(&body, None)).await;
        assert!(response.headers.is_empty());
    }
}

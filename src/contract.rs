//! The service contract: the operation set and its in-code description.
//!
//! [`SampleContract`] is the capability the endpoint dispatches to.
//! [`ServiceContract`] describes the same operations as data (element names,
//! SOAP actions, parameter and result shapes) for request routing and WSDL
//! generation.

use crate::config::ContractConfig;
use crate::model::CustomModel;
use crate::xml::XmlElement;
use async_trait::async_trait;

/// The three operations exposed by the service.
#[async_trait]
pub trait SampleContract: Send + Sync {
    /// Returns its input unchanged.
    async fn test(&self, s: String) -> String;

    /// Consumes an XML fragment for its side effect only.
    async fn xml_method(&self, xml: XmlElement);

    /// Returns its input unchanged.
    async fn echo_model(&self, input_model: CustomModel) -> CustomModel;
}

/// Which contract operation a descriptor refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Test,
    XmlMethod,
    EchoModel,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [Self::Test, Self::XmlMethod, Self::EchoModel];

    /// Element and operation name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Test => "Test",
            Self::XmlMethod => "XmlMethod",
            Self::EchoModel => "EchoModel",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Self::Test => 0,
            Self::XmlMethod => 1,
            Self::EchoModel => 2,
        }
    }
}

/// Shape of a parameter or result value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Plain string
    Text,
    /// Arbitrary XML element
    Xml,
    /// [`CustomModel`] record
    Record,
}

impl Shape {
    /// XSD type reference used in the WSDL schema.
    pub fn xsd_type(&self) -> String {
        match self {
            Self::Text => "xs:string".to_string(),
            Self::Xml => "xs:anyType".to_string(),
            Self::Record => format!("tns:{}", CustomModel::TYPE_NAME),
        }
    }
}

/// Named operation parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: &'static str,
    pub shape: Shape,
}

/// One operation of the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub kind: OperationKind,
    /// Request element name
    pub name: &'static str,
    /// SOAPAction URI
    pub action: String,
    pub input: Parameter,
    /// `None` for one-way-shaped operations that return nothing
    pub output: Option<Shape>,
}

impl OperationDescriptor {
    /// Response wrapper element name.
    pub fn response_element(&self) -> String {
        format!("{}Response", self.name)
    }

    /// Result element name inside the response wrapper.
    pub fn result_element(&self) -> String {
        format!("{}Result", self.name)
    }

    /// Whether a SOAPAction value selects this operation.
    ///
    /// Accepts the full action URI or the bare operation name.
    pub fn matches_action(&self, action: &str) -> bool {
        action == self.action || action == self.name
    }
}

/// The declared operation set with its naming.
#[derive(Debug, Clone)]
pub struct ServiceContract {
    /// Contract (port type) name
    pub name: String,
    /// Name of the `wsdl:service` element
    pub service_name: String,
    /// Target namespace
    pub namespace: String,
    operations: Vec<OperationDescriptor>,
}

impl ServiceContract {
    /// Build the contract for the given contract name and namespace.
    ///
    /// The WSDL service takes the contract name too; see
    /// [`Self::with_service_name`].
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let name = name.into();
        let namespace = namespace.into();
        let action_base = if namespace.ends_with('/') {
            format!("{}{}/", namespace, name)
        } else {
            format!("{}/{}/", namespace, name)
        };

        let operations = OperationKind::ALL
            .iter()
            .map(|&kind| {
                let (input, output) = match kind {
                    OperationKind::Test => (
                        Parameter {
                            name: "s",
                            shape: Shape::Text,
                        },
                        Some(Shape::Text),
                    ),
                    OperationKind::XmlMethod => (
                        Parameter {
                            name: "xml",
                            shape: Shape::Xml,
                        },
                        None,
                    ),
                    OperationKind::EchoModel => (
                        Parameter {
                            name: "inputModel",
                            shape: Shape::Record,
                        },
                        Some(Shape::Record),
                    ),
                };
                OperationDescriptor {
                    kind,
                    name: kind.name(),
                    action: format!("{}{}", action_base, kind.name()),
                    input,
                    output,
                }
            })
            .collect();

        Self {
            service_name: name.clone(),
            name,
            namespace,
            operations,
        }
    }

    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    pub fn from_config(config: &ContractConfig) -> Self {
        Self::new(config.name.clone(), config.namespace.clone())
            .with_service_name(config.service_name.clone())
    }

    pub fn operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }

    /// Operation whose request element has this local name.
    pub fn find_by_element(&self, local_name: &str) -> Option<&OperationDescriptor> {
        self.operations.iter().find(|op| op.name == local_name)
    }

    /// Operation selected by a SOAPAction value.
    pub fn find_by_action(&self, action: &str) -> Option<&OperationDescriptor> {
        self.operations.iter().find(|op| op.matches_action(action))
    }
}

impl Default for ServiceContract {
    fn default() -> Self {
        Self::from_config(&ContractConfig::default())
    }
}

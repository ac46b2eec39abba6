//! The custom record passed through `EchoModel`.

use crate::error::SoapError;
use crate::xml::{escape_text, XmlElement};
use serde::{Deserialize, Serialize};

/// Custom data model echoed back by `EchoModel`.
///
/// On the wire each field is a child element (`<Id>`, `<Name>`) of the
/// parameter or result element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomModel {
    pub id: i64,
    pub name: String,
}

impl CustomModel {
    /// XML type name used in the WSDL.
    pub const TYPE_NAME: &'static str = "CustomModel";

    /// Field element names with their XSD types, in serialization order.
    pub const FIELDS: [(&'static str, &'static str); 2] = [("Id", "xs:long"), ("Name", "xs:string")];

    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Decode from the element holding the fields.
    ///
    /// Field names match case-insensitively. Absent fields keep their
    /// default value; a present but unparsable `Id` is rejected.
    pub fn from_xml(element: &XmlElement) -> Result<Self, SoapError> {
        let mut model = Self::default();

        if let Some(id) = element.child_ignore_case("Id") {
            let text = id.text();
            model.id = text
                .trim()
                .parse()
                .map_err(|e| SoapError::InvalidParameter {
                    name: "Id".to_string(),
                    reason: format!("'{}': {}", text, e),
                })?;
        }
        if let Some(name) = element.child_ignore_case("Name") {
            model.name = name.text();
        }

        Ok(model)
    }

    /// Serialize the fields as child elements.
    pub fn to_xml_fields(&self) -> String {
        format!(
            "<Id>{}</Id><Name>{}</Name>",
            self.id,
            escape_text(&self.name)
        )
    }
}

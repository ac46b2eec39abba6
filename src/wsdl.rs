//! WSDL 1.1 generation from the in-code contract description.
//!
//! Document/literal wrapped style with one SOAP 1.1 and one SOAP 1.2
//! binding, both pointing at the same address.

use crate::contract::{OperationDescriptor, ServiceContract};
use crate::model::CustomModel;
use quick_xml::escape::escape;
use std::fmt::Write;

const WSDL_NS: &str = "http://schemas.xmlsoap.org/wsdl/";
const WSDL_SOAP11_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
const WSDL_SOAP12_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";
const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
const SOAP_HTTP_TRANSPORT: &str = "http://schemas.xmlsoap.org/soap/http";

/// Render the WSDL for a contract served at `address`.
pub fn generate_wsdl(contract: &ServiceContract, address: &str) -> String {
    let ns = escape(contract.namespace.as_str());
    let name = escape(contract.name.as_str());

    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write!(
        out,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<wsdl:definitions xmlns:wsdl="{WSDL_NS}" xmlns:soap="{WSDL_SOAP11_NS}" xmlns:soap12="{WSDL_SOAP12_NS}" xmlns:xs="{XSD_NS}" xmlns:tns="{ns}" targetNamespace="{ns}" name="{name}">
"#
    );

    write_types(&mut out, contract);
    write_messages(&mut out, contract);

    let _ = writeln!(out, r#"  <wsdl:portType name="{name}">"#);
    for op in contract.operations() {
        let _ = write!(
            out,
            r#"    <wsdl:operation name="{op}">
      <wsdl:input message="tns:{op}Request" />
      <wsdl:output message="tns:{op}Response" />
    </wsdl:operation>
"#,
            op = op.name
        );
    }
    let _ = writeln!(out, "  </wsdl:portType>");

    write_binding(&mut out, contract, "soap", "Soap");
    write_binding(&mut out, contract, "soap12", "Soap12");

    let address = escape(address);
    let service = escape(contract.service_name.as_str());
    let _ = write!(
        out,
        r#"  <wsdl:service name="{service}">
    <wsdl:port name="{service}Soap" binding="tns:{name}Soap">
      <soap:address location="{address}" />
    </wsdl:port>
    <wsdl:port name="{service}Soap12" binding="tns:{name}Soap12">
      <soap12:address location="{address}" />
    </wsdl:port>
  </wsdl:service>
</wsdl:definitions>
"#
    );
    out
}

fn write_types(out: &mut String, contract: &ServiceContract) {
    let ns = escape(contract.namespace.as_str());
    let _ = write!(
        out,
        r#"  <wsdl:types>
    <xs:schema elementFormDefault="qualified" targetNamespace="{ns}">
"#
    );

    for op in contract.operations() {
        let _ = write!(
            out,
            r#"      <xs:element name="{}">
        <xs:complexType>
          <xs:sequence>
            <xs:element minOccurs="0" name="{}" type="{}" />
          </xs:sequence>
        </xs:complexType>
      </xs:element>
"#,
            op.name,
            op.input.name,
            op.input.shape.xsd_type()
        );
        write_response_element(out, op);
    }

    let _ = write!(
        out,
        r#"      <xs:complexType name="{}">
        <xs:sequence>
"#,
        CustomModel::TYPE_NAME
    );
    for (field, xsd_type) in CustomModel::FIELDS {
        let _ = writeln!(
            out,
            r#"          <xs:element minOccurs="0" name="{field}" type="{xsd_type}" />"#
        );
    }
    let _ = write!(
        out,
        r#"        </xs:sequence>
      </xs:complexType>
    </xs:schema>
  </wsdl:types>
"#
    );
}

fn write_response_element(out: &mut String, op: &OperationDescriptor) {
    let response = op.response_element();
    match op.output {
        Some(shape) => {
            let _ = write!(
                out,
                r#"      <xs:element name="{response}">
        <xs:complexType>
          <xs:sequence>
            <xs:element minOccurs="0" name="{}" type="{}" />
          </xs:sequence>
        </xs:complexType>
      </xs:element>
"#,
                op.result_element(),
                shape.xsd_type()
            );
        }
        None => {
            let _ = write!(
                out,
                r#"      <xs:element name="{response}">
        <xs:complexType>
          <xs:sequence />
        </xs:complexType>
      </xs:element>
"#
            );
        }
    }
}

fn write_messages(out: &mut String, contract: &ServiceContract) {
    for op in contract.operations() {
        let _ = write!(
            out,
            r#"  <wsdl:message name="{op}Request">
    <wsdl:part name="parameters" element="tns:{op}" />
  </wsdl:message>
  <wsdl:message name="{op}Response">
    <wsdl:part name="parameters" element="tns:{response}" />
  </wsdl:message>
"#,
            op = op.name,
            response = op.response_element()
        );
    }
}

fn write_binding(out: &mut String, contract: &ServiceContract, prefix: &str, suffix: &str) {
    let name = escape(contract.name.as_str());
    let _ = write!(
        out,
        r#"  <wsdl:binding name="{name}{suffix}" type="tns:{name}">
    <{prefix}:binding transport="{SOAP_HTTP_TRANSPORT}" />
"#
    );
    for op in contract.operations() {
        let _ = write!(
            out,
            r#"    <wsdl:operation name="{}">
      <{prefix}:operation soapAction="{}" style="document" />
      <wsdl:input>
        <{prefix}:body use="literal" />
      </wsdl:input>
      <wsdl:output>
        <{prefix}:body use="literal" />
      </wsdl:output>
    </wsdl:operation>
"#,
            op.name,
            escape(op.action.as_str())
        );
    }
    let _ = writeln!(out, "  </wsdl:binding>");
}

//! Owned XML tree used for SOAP bodies and the `XmlMethod` fragment.
//!
//! Built from quick-xml's namespace-aware reader. quick-xml never expands
//! external entities; DOCTYPE declarations are rejected outright.

use crate::error::SoapError;
use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use std::borrow::Cow;
use std::fmt;

/// Namespace reserved for `xmlns` declarations.
const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";

/// Limits applied while building a tree.
#[derive(Debug, Clone, Copy)]
pub struct ParseLimits {
    /// Maximum nesting depth (root element is depth 1)
    pub max_depth: u32,
    /// Maximum number of elements
    pub max_elements: u32,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_elements: 10_000,
        }
    }
}

/// A node inside an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An attribute with its resolved namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Qualified name as written
    pub name: String,
    /// Resolved namespace URI; unprefixed attributes have none
    pub namespace: Option<String>,
    pub value: String,
}

impl XmlAttribute {
    /// Local part of the name.
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    /// Prefix bound by this attribute if it is a namespace declaration
    /// (`""` for the default namespace).
    fn declared_prefix(&self) -> Option<&str> {
        if self.name == "xmlns" {
            Some("")
        } else {
            self.name.strip_prefix("xmlns:")
        }
    }
}

/// An XML element with its resolved namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written (`prefix:local` or `local`)
    pub name: String,
    /// Local part of the name
    pub local_name: String,
    /// Resolved namespace URI, if bound
    pub namespace: Option<String>,
    /// Attributes in document order, including `xmlns` declarations
    pub attributes: Vec<XmlAttribute>,
    /// Child nodes in document order
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an element with no namespace, attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let local_name = match name.split_once(':') {
            Some((_, local)) => local.to_string(),
            None => name.clone(),
        };
        Self {
            name,
            local_name,
            namespace: None,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Append a child element.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Append a text node.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Add an unqualified attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(XmlAttribute {
            name: key.into(),
            namespace: None,
            value: value.into(),
        });
        self
    }

    /// Iterate over child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element with the given local name.
    pub fn child(&self, local_name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.local_name == local_name)
    }

    /// First child element whose local name matches ignoring ASCII case.
    pub fn child_ignore_case(&self, local_name: &str) -> Option<&XmlElement> {
        self.elements()
            .find(|e| e.local_name.eq_ignore_ascii_case(local_name))
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Value of the attribute whose local name matches, ignoring any prefix.
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.local_name() == local_name && a.declared_prefix().is_none())
            .map(|a| a.value.as_str())
    }

    /// Value of the attribute with this namespace and local name.
    pub fn attribute_ns(&self, namespace: &str, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && a.local_name() == local_name)
            .map(|a| a.value.as_str())
    }

    fn has_element_children(&self) -> bool {
        self.elements().next().is_some()
    }

    fn prefix(&self) -> &str {
        self.name.split_once(':').map_or("", |(prefix, _)| prefix)
    }

    /// Write the element, declaring any namespace it uses that `scope`
    /// (prefix, URI pairs in effect) does not already bind.
    fn write_scoped(
        &self,
        f: &mut fmt::Formatter<'_>,
        scope: &mut Vec<(String, String)>,
    ) -> fmt::Result {
        let outer = scope.len();
        for attr in &self.attributes {
            if let Some(prefix) = attr.declared_prefix() {
                scope.push((prefix.to_string(), attr.value.clone()));
            }
        }

        write!(f, "<{}", self.name)?;
        for attr in &self.attributes {
            write!(f, " {}=\"{}\"", attr.name, escape(attr.value.as_str()))?;
        }

        let prefix = self.prefix();
        let namespace = self.namespace.as_deref().unwrap_or("");
        let bound = scope
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map_or("", |(_, uri)| uri.as_str());
        // An unbound prefix cannot be undeclared
        if bound != namespace && (prefix.is_empty() || !namespace.is_empty()) {
            if prefix.is_empty() {
                write!(f, " xmlns=\"{}\"", escape(namespace))?;
            } else {
                write!(f, " xmlns:{}=\"{}\"", prefix, escape(namespace))?;
            }
            scope.push((prefix.to_string(), namespace.to_string()));
        }

        if self.children.is_empty() {
            write!(f, " />")?;
        } else {
            write!(f, ">")?;
            for child in &self.children {
                match child {
                    XmlNode::Element(e) => e.write_scoped(f, scope)?,
                    XmlNode::Text(t) => write!(f, "{}", escape_text(t))?,
                }
            }
            write!(f, "</{}>", self.name)?;
        }

        scope.truncate(outer);
        Ok(())
    }
}

/// Renders the element as standalone XML. Namespaces inherited from the
/// document it was parsed from are declared where they are first used.
impl fmt::Display for XmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_scoped(f, &mut Vec::new())
    }
}

/// Escape character data. Carriage returns are written as `&#13;` so a
/// reader's line-end normalization gives back the same string.
pub fn escape_text(text: &str) -> Cow<'_, str> {
    let escaped = partial_escape(text);
    if escaped.contains('\r') {
        Cow::Owned(escaped.replace('\r', "&#13;"))
    } else {
        escaped
    }
}

/// Parse a standalone fragment such as `<a><b/></a>`.
pub fn parse_fragment(xml: &str) -> Result<XmlElement, SoapError> {
    parse_document(xml, ParseLimits::default())
}

/// Parse a document into its root element.
pub fn parse_document(xml: &str, limits: ParseLimits) -> Result<XmlElement, SoapError> {
    let mut reader = NsReader::from_str(xml);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut element_count = 0u32;

    loop {
        let (ns, event) = reader.read_resolved_event()?;
        let namespace = resolved_namespace(ns);
        let is_start = matches!(event, Event::Start(_));

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                if root.is_some() {
                    return Err(SoapError::XmlParse(
                        "content after the root element".to_string(),
                    ));
                }
                element_count += 1;
                if element_count > limits.max_elements {
                    return Err(SoapError::LimitExceeded(format!(
                        "more than {} elements",
                        limits.max_elements
                    )));
                }
                let depth = stack.len() as u32 + 1;
                if depth > limits.max_depth {
                    return Err(SoapError::LimitExceeded(format!(
                        "nesting deeper than {}",
                        limits.max_depth
                    )));
                }

                let element = start_element(&reader, e, namespace)?;
                if is_start {
                    stack.push(element);
                } else {
                    attach(&mut stack, &mut root, element);
                }
            }

            Event::End(_) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| SoapError::XmlParse("unbalanced end tag".to_string()))?;
                if element.has_element_children() {
                    element.children.retain(|node| match node {
                        XmlNode::Text(t) => !t.trim().is_empty(),
                        XmlNode::Element(_) => true,
                    });
                }
                attach(&mut stack, &mut root, element);
            }

            Event::Text(ref e) => {
                let text = e.unescape()?;
                push_text(&mut stack, &text)?;
            }

            Event::CData(e) => {
                let text = String::from_utf8(e.into_inner().into_owned())
                    .map_err(|e| SoapError::XmlParse(format!("Invalid UTF-8 in CDATA: {}", e)))?;
                push_text(&mut stack, &text)?;
            }

            Event::DocType(_) => return Err(SoapError::DoctypeDetected),

            Event::Eof => break,

            // Declarations, comments and processing instructions carry no data
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(SoapError::XmlParse("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| SoapError::XmlParse("document has no root element".to_string()))
}

fn resolved_namespace(ns: ResolveResult) -> Option<String> {
    match ns {
        ResolveResult::Bound(ns) => std::str::from_utf8(ns.as_ref()).ok().map(String::from),
        _ => None,
    }
}

fn start_element(
    reader: &NsReader<&[u8]>,
    e: &BytesStart,
    namespace: Option<String>,
) -> Result<XmlElement, SoapError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let local_name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let (ns, _) = reader.resolve_attribute(attr.key);
        let namespace = resolved_namespace(ns).filter(|ns| ns != XMLNS_NS);
        attributes.push(XmlAttribute {
            name: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            namespace,
            value: attr.unescape_value()?.into_owned(),
        });
    }

    Ok(XmlElement {
        name,
        local_name,
        namespace,
        attributes,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None => *root = Some(element),
    }
}

fn push_text(stack: &mut [XmlElement], text: &str) -> Result<(), SoapError> {
    match stack.last_mut() {
        Some(parent) => {
            // Adjacent text and CDATA read as one run
            if let Some(XmlNode::Text(prev)) = parent.children.last_mut() {
                prev.push_str(text);
            } else {
                parent.children.push(XmlNode::Text(text.to_string()));
            }
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(SoapError::XmlParse(
            "text outside the root element".to_string(),
        )),
    }
}

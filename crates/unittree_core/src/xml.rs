//! XML form of the unit tree consumed by tree renderers.
//!
//! ```text
//! <units>
//!   <unit>
//!     <id-unit>0</id-unit>
//!     <label><![CDATA[Root]]></label>
//!     <description><![CDATA[Root unit]]></description>
//!     <unit-children> <unit>...</unit> </unit-children>
//!   </unit>
//! </units>
//! ```
//!
//! `unit-children` is only written for units that have children.

use crate::model::unit::{Unit, UnitId};
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const TAG_UNITS: &str = "units";
pub const TAG_UNIT: &str = "unit";
pub const TAG_ID_UNIT: &str = "id-unit";
pub const TAG_LABEL: &str = "label";
pub const TAG_DESCRIPTION: &str = "description";
pub const TAG_UNIT_CHILDREN: &str = "unit-children";

#[derive(Debug)]
pub enum XmlError {
    Write(std::io::Error),
    Parse(quick_xml::Error),
    Malformed(String),
}

impl Display for XmlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Write(err) => write!(f, "failed to write units xml: {err}"),
            Self::Parse(err) => write!(f, "failed to parse units xml: {err}"),
            Self::Malformed(message) => write!(f, "malformed units xml: {message}"),
        }
    }
}

impl Error for XmlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Write(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Malformed(_) => None,
        }
    }
}

impl From<std::io::Error> for XmlError {
    fn from(value: std::io::Error) -> Self {
        Self::Write(value)
    }
}

impl From<quick_xml::Error> for XmlError {
    fn from(value: quick_xml::Error) -> Self {
        Self::Parse(value)
    }
}

/// Serializes the subtree under `root_id` depth-first, parents before children.
///
/// `units` must contain every unit of the tree; children keep the order they
/// have in `units`. A missing root yields an empty `units` element. Units
/// reachable twice (corrupt parent data) are written once.
pub fn units_to_xml(units: &[Unit], root_id: UnitId) -> Result<String, XmlError> {
    let mut children: HashMap<UnitId, Vec<&Unit>> = HashMap::new();
    let mut root = None;
    for unit in units {
        if unit.id_unit == root_id {
            root = Some(unit);
        } else {
            children.entry(unit.id_parent).or_default().push(unit);
        }
    }

    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Start(BytesStart::new(TAG_UNITS)))?;
    if let Some(root) = root {
        let mut visited = HashSet::new();
        write_unit(&mut writer, root, &children, &mut visited)?;
    }
    writer.write_event(Event::End(BytesEnd::new(TAG_UNITS)))?;

    String::from_utf8(writer.into_inner())
        .map_err(|err| XmlError::Malformed(format!("non utf-8 output: {err}")))
}

fn write_unit(
    writer: &mut Writer<Vec<u8>>,
    unit: &Unit,
    children: &HashMap<UnitId, Vec<&Unit>>,
    visited: &mut HashSet<UnitId>,
) -> Result<(), XmlError> {
    if !visited.insert(unit.id_unit) {
        return Ok(());
    }

    writer.write_event(Event::Start(BytesStart::new(TAG_UNIT)))?;
    write_text_element(writer, TAG_ID_UNIT, &unit.id_unit.to_string())?;
    write_cdata_element(writer, TAG_LABEL, &unit.label)?;
    write_cdata_element(writer, TAG_DESCRIPTION, &unit.description)?;

    let unit_children: Vec<&Unit> = children
        .get(&unit.id_unit)
        .map(|list| {
            list.iter()
                .copied()
                .filter(|child| !visited.contains(&child.id_unit))
                .collect()
        })
        .unwrap_or_default();

    if !unit_children.is_empty() {
        writer.write_event(Event::Start(BytesStart::new(TAG_UNIT_CHILDREN)))?;
        for child in unit_children {
            write_unit(writer, child, children, visited)?;
        }
        writer.write_event(Event::End(BytesEnd::new(TAG_UNIT_CHILDREN)))?;
    }

    writer.write_event(Event::End(BytesEnd::new(TAG_UNIT)))?;
    Ok(())
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    tag: &str,
    text: &str,
) -> Result<(), XmlError> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// Writes `text` as CDATA, splitting around `]]>` so the section stays valid.
fn write_cdata_element(
    writer: &mut Writer<Vec<u8>>,
    tag: &str,
    text: &str,
) -> Result<(), XmlError> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    let mut rest = text;
    while let Some(position) = rest.find("]]>") {
        writer.write_event(Event::CData(BytesCData::new(&rest[..position + 2])))?;
        rest = &rest[position + 2..];
    }
    writer.write_event(Event::CData(BytesCData::new(rest)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// One `unit` element read back from the XML form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitTreeNode {
    pub id_unit: UnitId,
    pub label: String,
    pub description: String,
    pub children: Vec<UnitTreeNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    IdUnit,
    Label,
    Description,
}

/// Parses the XML form back into nodes; returns the top-level units.
pub fn parse_units_xml(xml: &str) -> Result<Vec<UnitTreeNode>, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut roots = Vec::new();
    let mut stack: Vec<(UnitTreeNode, String)> = Vec::new();
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event()? {
            Event::Start(element) => match element.name().as_ref() {
                b"unit" => stack.push((UnitTreeNode::default(), String::new())),
                b"id-unit" => field = Some(Field::IdUnit),
                b"label" => field = Some(Field::Label),
                b"description" => field = Some(Field::Description),
                _ => {}
            },
            Event::Text(text) => {
                let value = text.unescape()?;
                append_field(&mut stack, field, &value)?;
            }
            Event::CData(data) => {
                let value = String::from_utf8_lossy(&data).into_owned();
                append_field(&mut stack, field, &value)?;
            }
            Event::End(element) => match element.name().as_ref() {
                b"unit" => {
                    let (mut node, raw_id) = stack
                        .pop()
                        .ok_or_else(|| XmlError::Malformed("unbalanced unit element".into()))?;
                    node.id_unit = raw_id.trim().parse().map_err(|_| {
                        XmlError::Malformed(format!("invalid id-unit value `{raw_id}`"))
                    })?;
                    match stack.last_mut() {
                        Some((parent, _)) => parent.children.push(node),
                        None => roots.push(node),
                    }
                }
                b"id-unit" | b"label" | b"description" => field = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlError::Malformed("unclosed unit element".into()));
    }
    Ok(roots)
}

fn append_field(
    stack: &mut [(UnitTreeNode, String)],
    field: Option<Field>,
    value: &str,
) -> Result<(), XmlError> {
    let Some(field) = field else {
        return Ok(());
    };
    let (node, raw_id) = stack
        .last_mut()
        .ok_or_else(|| XmlError::Malformed("field outside of a unit element".into()))?;
    match field {
        Field::IdUnit => raw_id.push_str(value),
        Field::Label => node.label.push_str(value),
        Field::Description => node.description.push_str(value),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_units_xml, units_to_xml};
    use crate::model::unit::{Unit, ID_NULL, ID_ROOT};

    fn unit(id_unit: i32, id_parent: i32, label: &str) -> Unit {
        let mut unit = Unit::new(id_parent, label, format!("{label} description"));
        unit.id_unit = id_unit;
        unit
    }

    #[test]
    fn missing_root_writes_empty_units_element() {
        let xml = units_to_xml(&[unit(4, 2, "Orphan")], ID_ROOT).unwrap();
        assert_eq!(xml, "<units></units>");
    }

    #[test]
    fn single_root_has_no_children_wrapper() {
        let xml = units_to_xml(&[unit(ID_ROOT, ID_NULL, "Root")], ID_ROOT).unwrap();
        assert_eq!(
            xml,
            "<units><unit><id-unit>0</id-unit>\
             <label><![CDATA[Root]]></label>\
             <description><![CDATA[Root description]]></description>\
             </unit></units>"
        );
    }

    #[test]
    fn cdata_terminator_in_labels_is_split() {
        let xml = units_to_xml(&[unit(ID_ROOT, ID_NULL, "a]]>b")], ID_ROOT).unwrap();
        assert!(xml.contains("<label><![CDATA[a]]]]><![CDATA[>b]]></label>"));

        let parsed = parse_units_xml(&xml).unwrap();
        assert_eq!(parsed[0].label, "a]]>b");
    }

    #[test]
    fn parent_cycles_do_not_loop() {
        let units = vec![
            unit(ID_ROOT, ID_NULL, "Root"),
            unit(1, ID_ROOT, "A"),
            unit(2, 3, "B"),
            unit(3, 2, "C"),
        ];
        let xml = units_to_xml(&units, ID_ROOT).unwrap();
        let parsed = parse_units_xml(&xml).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].children.len(), 1);
        assert_eq!(parsed[0].children[0].label, "A");
    }

    #[test]
    fn malformed_id_is_reported() {
        let err = parse_units_xml("<units><unit><id-unit>x</id-unit></unit></units>").unwrap_err();
        assert!(err.to_string().contains("invalid id-unit"));
    }
}

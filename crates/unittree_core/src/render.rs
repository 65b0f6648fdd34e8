//! Turns the XML form of the unit tree into HTML.

use crate::model::unit::{UnitId, ID_NULL};
use crate::xml::{parse_units_xml, UnitTreeNode, XmlError};
use quick_xml::escape::escape;
use std::collections::BTreeMap;

/// Renderer parameter naming the unit to highlight.
pub const PARAMETER_ID_CURRENT_UNIT: &str = "id-current-unit";

/// Page every tree link points to.
pub const MANAGE_UNITS_URL: &str = "ManageUnits.jsp";

/// Rendering step fed with the units XML and named string parameters.
pub trait TreeRenderer {
    fn render(&self, units_xml: &str, parameters: &BTreeMap<String, String>)
        -> Result<String, XmlError>;
}

/// Built-in renderer producing nested `<ul>` lists.
#[derive(Debug, Clone)]
pub struct HtmlTreeRenderer {
    link_base: String,
}

impl Default for HtmlTreeRenderer {
    fn default() -> Self {
        Self::new(MANAGE_UNITS_URL)
    }
}

impl HtmlTreeRenderer {
    /// Links become `<link_base>?idUnit=<id>`.
    pub fn new(link_base: impl Into<String>) -> Self {
        Self {
            link_base: link_base.into(),
        }
    }

    fn render_node(&self, html: &mut String, node: &UnitTreeNode, current: UnitId) {
        let class = if node.id_unit == current {
            "unit current"
        } else {
            "unit"
        };
        html.push_str(&format!(
            "<li class=\"{class}\" data-id-unit=\"{id}\"><a href=\"{base}?idUnit={id}\" title=\"{title}\">{label}</a>",
            id = node.id_unit,
            base = escape(self.link_base.as_str()),
            title = escape(node.description.as_str()),
            label = escape(node.label.as_str()),
        ));
        if !node.children.is_empty() {
            html.push_str("<ul>");
            for child in &node.children {
                self.render_node(html, child, current);
            }
            html.push_str("</ul>");
        }
        html.push_str("</li>");
    }
}

impl TreeRenderer for HtmlTreeRenderer {
    fn render(
        &self,
        units_xml: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Result<String, XmlError> {
        let roots = parse_units_xml(units_xml)?;
        let current = parameters
            .get(PARAMETER_ID_CURRENT_UNIT)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(ID_NULL);

        let mut html = String::from("<ul class=\"unit-tree\">");
        for node in &roots {
            self.render_node(&mut html, node, current);
        }
        html.push_str("</ul>");
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::{HtmlTreeRenderer, TreeRenderer, PARAMETER_ID_CURRENT_UNIT};
    use std::collections::BTreeMap;

    const XML: &str = "<units><unit><id-unit>0</id-unit>\
        <label><![CDATA[Root]]></label><description><![CDATA[Top]]></description>\
        <unit-children><unit><id-unit>1</id-unit>\
        <label><![CDATA[R&D <lab>]]></label><description><![CDATA[\"x\"]]></description>\
        </unit></unit-children></unit></units>";

    #[test]
    fn marks_current_unit_and_escapes_text() {
        let mut parameters = BTreeMap::new();
        parameters.insert(PARAMETER_ID_CURRENT_UNIT.to_string(), "1".to_string());

        let html = HtmlTreeRenderer::default().render(XML, &parameters).unwrap();
        assert!(html.starts_with("<ul class=\"unit-tree\"><li class=\"unit\" data-id-unit=\"0\">"));
        assert!(html.contains(
            "<li class=\"unit current\" data-id-unit=\"1\"><a href=\"ManageUnits.jsp?idUnit=1\" title=\"&quot;x&quot;\">R&amp;D &lt;lab&gt;</a></li>"
        ));
        assert!(html.ends_with("</ul></li></ul>"));
    }

    #[test]
    fn missing_parameter_highlights_nothing() {
        let html = HtmlTreeRenderer::new("units")
            .render(XML, &BTreeMap::new())
            .unwrap();
        assert!(!html.contains("current"));
        assert!(html.contains("href=\"units?idUnit=0\""));
    }

    #[test]
    fn empty_tree_renders_empty_list() {
        let html = HtmlTreeRenderer::default()
            .render("<units></units>", &BTreeMap::new())
            .unwrap();
        assert_eq!(html, "<ul class=\"unit-tree\"></ul>");
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::utils::regex::RegexPatterns;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComponentKind {
    Header,
    Body,
    Footer,
    Buttons,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateButton {
    #[serde(rename = "type")]
    pub button_type: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateComponent {
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    /// Header format (`TEXT`, `IMAGE`, `DOCUMENT`, `VIDEO`); absent for other kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<TemplateButton>,
}

impl TemplateComponent {
    /// Highest `{{n}}` index used in this component's text.
    pub fn placeholder_count(&self) -> usize {
        self.text.as_deref().map_or(0, placeholder_count)
    }
}

/// An approved template as returned by `getAvailableTemplates`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub name: String,
    pub language: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub components: Vec<TemplateComponent>,
}

impl MessageTemplate {
    pub fn component(&self, kind: ComponentKind) -> Option<&TemplateComponent> {
        self.components.iter().find(|c| c.kind == kind)
    }

    pub fn body_text(&self) -> &str {
        self.component(ComponentKind::Body)
            .and_then(|c| c.text.as_deref())
            .unwrap_or("")
    }

    /// Number of variables the operator must fill in across header, body and footer.
    pub fn placeholder_count(&self) -> usize {
        self.components
            .iter()
            .filter(|c| c.kind != ComponentKind::Buttons)
            .map(TemplateComponent::placeholder_count)
            .sum()
    }

    /// Body text with `{{n}}` replaced by `body_params[n-1]`. Missing params keep
    /// their placeholder so the operator sees what is still unfilled.
    pub fn render_body(&self, body_params: &[String]) -> String {
        render_placeholders(self.body_text(), body_params)
    }

    /// Build the send request for this template. Parameters are consumed in
    /// component order (header, then body, then footer).
    pub fn to_send(&self, params: &[String]) -> TemplateSend {
        let mut cursor = 0usize;
        let mut body_params: &[String] = &[];
        let mut components = Vec::new();
        for component in &self.components {
            let kind = match component.kind {
                ComponentKind::Header => "header",
                ComponentKind::Body => "body",
                ComponentKind::Footer => "footer",
                ComponentKind::Buttons => continue,
            };
            let count = component.placeholder_count();
            if count == 0 {
                continue;
            }
            if component.kind == ComponentKind::Body {
                let end = (cursor + count).min(params.len());
                body_params = params.get(cursor..end).unwrap_or(&[]);
            }
            let parameters: Vec<Value> = (0..count)
                .map(|i| {
                    let text = params.get(cursor + i).cloned().unwrap_or_default();
                    json!({"type": "text", "text": text})
                })
                .collect();
            cursor += count;
            components.push(json!({"type": kind, "parameters": parameters}));
        }

        TemplateSend {
            template_name: self.name.clone(),
            language_code: self.language.clone(),
            components: (!components.is_empty()).then_some(components),
            preview: Some(self.render_body(body_params)),
        }
    }
}

/// Arguments of `sendTemplateMessage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSend {
    pub template_name: String,
    pub language_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<Value>>,
    /// Rendered body shown in the optimistic bubble; never sent to the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

pub fn placeholder_count(text: &str) -> usize {
    RegexPatterns::template_placeholder()
        .captures_iter(text)
        .filter_map(|cap| cap.get(1)?.as_str().parse::<usize>().ok())
        .max()
        .unwrap_or(0)
}

pub fn render_placeholders(text: &str, params: &[String]) -> String {
    RegexPatterns::template_placeholder()
        .replace_all(text, |caps: &regex::Captures| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            let idx = caps
                .get(1)
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .unwrap_or(0);
            if idx == 0 {
                return whole.to_string();
            }
            params
                .get(idx - 1)
                .filter(|p| !p.is_empty())
                .cloned()
                .unwrap_or_else(|| whole.to_string())
        })
        .into_owned()
}

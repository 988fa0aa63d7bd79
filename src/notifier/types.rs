//! MessageCard payloads for the chat webhook

use serde::{Deserialize, Serialize};

pub const CARD_TYPE: &str = "MessageCard";
pub const CARD_CONTEXT: &str = "http://schema.org/extensions";
pub const THEME_COLOR: &str = "ccc";

/// Placeholder the chat client replaces with the operator's input
pub const NAME_PLACEHOLDER: &str = "{{name.value}}";

/// Top-level webhook body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCard {
    #[serde(rename = "@type")]
    pub card_type: String,
    #[serde(rename = "@context")]
    pub context: String,
    pub theme_color: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    pub title: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub potential_action: Vec<ActionCard>,
}

/// Collapsible card with inputs and buttons
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCard {
    #[serde(rename = "@type")]
    pub card_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<TextInput>,
    pub actions: Vec<HttpPostAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextInput {
    #[serde(rename = "@type")]
    pub input_type: String,
    pub id: String,
    pub placeholder: String,
    pub title: String,
}

/// Button that POSTs `body` to `target` when pressed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpPostAction {
    #[serde(rename = "@type")]
    pub action_type: String,
    pub name: String,
    pub target: String,
    /// JSON string template, may contain [`NAME_PLACEHOLDER`]
    pub body: String,
    pub headers: Vec<ActionHeader>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionHeader {
    pub name: String,
    pub value: String,
}

impl HttpPostAction {
    fn json_post(name: &str, target: &str, body: String) -> Self {
        Self {
            action_type: "HttpPOST".to_string(),
            name: name.to_string(),
            target: target.to_string(),
            body,
            headers: vec![ActionHeader {
                name: "Content-Type".to_string(),
                value: "application/json".to_string(),
            }],
        }
    }
}

impl MessageCard {
    fn base(title: String, text: String) -> Self {
        Self {
            card_type: CARD_TYPE.to_string(),
            context: CARD_CONTEXT.to_string(),
            theme_color: THEME_COLOR.to_string(),
            summary: String::new(),
            title,
            text,
            sections: Vec::new(),
        }
    }

    /// Greeting for a recognized person
    pub fn welcome(identity: &str, image_url: &str) -> Self {
        Self::base(
            format!("welcome to the office {}", identity),
            image_markdown(image_url),
        )
    }

    /// Triage card for an unrecognized face, with label and discard actions
    /// posting back to `train_url` for `artifact_key`
    pub fn triage(image_url: &str, train_url: &str, artifact_key: &str) -> Self {
        let title = "I don't know who this is...".to_string();

        let train_body = serde_json::json!({
            "action": "train",
            "key": artifact_key,
            "name": NAME_PLACEHOLDER,
        })
        .to_string();
        let discard_body = serde_json::json!({
            "action": "discard",
            "key": artifact_key,
        })
        .to_string();

        let card = ActionCard {
            card_type: "ActionCard".to_string(),
            name: "who".to_string(),
            inputs: vec![TextInput {
                input_type: "TextInput".to_string(),
                id: "name".to_string(),
                placeholder: "name".to_string(),
                title: "whodisis".to_string(),
            }],
            actions: vec![
                HttpPostAction::json_post("Submit", train_url, train_body),
                HttpPostAction::json_post("Discard", train_url, discard_body),
            ],
        };

        Self {
            summary: title.clone(),
            sections: vec![Section {
                potential_action: vec![card],
            }],
            ..Self::base(title, image_markdown(image_url))
        }
    }

    /// All HttpPOST actions embedded in the card, in order
    pub fn actions(&self) -> impl Iterator<Item = &HttpPostAction> {
        self.sections
            .iter()
            .flat_map(|s| s.potential_action.iter())
            .flat_map(|c| c.actions.iter())
    }
}

fn image_markdown(image_url: &str) -> String {
    format!("![who]({})", image_url)
}

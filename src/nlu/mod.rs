//! Per-scenario NLU configuration that accompanies each knowledge graph.
//!
//! Only storage and lookup live here; understanding utterances is someone
//! else's job.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn default_max_options() -> usize {
    3
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// How candidate answers are ordered when presented to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSetting {
    pub attribute_name: String,
    pub order: SortOrder,
}

/// A slot the dialog asks the user to fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogSlot {
    pub name: String,
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSetting {
    pub scenario: String,
    /// Name of the vertex queries start from when no start name is given.
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default = "default_max_options")]
    pub max_options: usize,
    #[serde(default)]
    pub sort_setting: Option<SortSetting>,
    #[serde(default)]
    pub slots: Vec<DialogSlot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntentRuleType {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NluIntentRule {
    pub id: String,
    pub intent_name: String,
    #[serde(rename = "type")]
    pub rule_type: IntentRuleType,
    #[serde(default)]
    pub rule_secs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityData {
    pub id: String,
    pub intent_name: String,
    pub entity_value: String,
    pub entity_type: String,
    #[serde(default)]
    pub similar_word: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityAttributeData {
    pub id: String,
    pub intent_name: String,
    pub entity_value: String,
    pub entity_type: String,
    pub attribute_name: String,
    pub attribute_value: String,
}

/// Everything the importer reads from a datastore's `nlu/` folder.
#[derive(Debug, Clone, Default)]
pub struct NluData {
    pub settings: Vec<ScenarioSetting>,
    pub intent_rules: Vec<NluIntentRule>,
    pub entities: Vec<EntityData>,
    pub entity_attributes: Vec<EntityAttributeData>,
}

/// Read-only NLU lookups for one datastore.
#[derive(Debug, Default)]
pub struct NluStore {
    settings: HashMap<String, ScenarioSetting>,
    intent_rules: Vec<NluIntentRule>,
    entities: Vec<EntityData>,
    entity_attributes: Vec<EntityAttributeData>,
}

impl NluStore {
    /// Later settings for the same scenario replace earlier ones.
    pub fn new(data: NluData) -> Self {
        let mut settings = HashMap::new();
        for setting in data.settings {
            if let Some(previous) = settings.insert(setting.scenario.clone(), setting) {
                log::warn!("scenario '{}' configured more than once, keeping the last", previous.scenario);
            }
        }
        Self {
            settings,
            intent_rules: data.intent_rules,
            entities: data.entities,
            entity_attributes: data.entity_attributes,
        }
    }

    pub fn setting(&self, scenario: &str) -> Option<&ScenarioSetting> {
        self.settings.get(scenario)
    }

    /// Configured root vertex name of `scenario`.
    pub fn root(&self, scenario: &str) -> Option<&str> {
        self.setting(scenario)
            .and_then(|s| s.root.as_deref())
            .filter(|r| !r.trim().is_empty())
    }

    pub fn max_options(&self, scenario: &str) -> usize {
        self.setting(scenario)
            .map(|s| s.max_options)
            .unwrap_or_else(default_max_options)
    }

    pub fn sort_setting(&self, scenario: &str) -> Option<&SortSetting> {
        self.setting(scenario).and_then(|s| s.sort_setting.as_ref())
    }

    pub fn configured_slots(&self, scenario: &str) -> Option<&[DialogSlot]> {
        self.setting(scenario).map(|s| s.slots.as_slice())
    }

    pub fn scenarios(&self) -> impl Iterator<Item = &str> {
        self.settings.keys().map(String::as_str)
    }

    pub fn intent_rules(&self) -> &[NluIntentRule] {
        &self.intent_rules
    }

    pub fn entities_for_intent<'a>(&'a self, intent: &'a str) -> impl Iterator<Item = &'a EntityData> + 'a {
        self.entities.iter().filter(move |e| e.intent_name == intent)
    }

    pub fn entity_attributes_for<'a>(
        &'a self,
        intent: &'a str,
        entity_value: &'a str,
    ) -> impl Iterator<Item = &'a EntityAttributeData> + 'a {
        self.entity_attributes
            .iter()
            .filter(move |a| a.intent_name == intent && a.entity_value == entity_value)
    }
}

use serde::Deserialize;
use std::collections::HashMap;

/// Backbones we know how to put a sequence-classification head on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Bert,
    XlmRoberta,
}

/// The slice of a Hugging Face `config.json` that is shared by every
/// supported architecture. The backbone-specific configs are parsed
/// separately from the same file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    pub model_type: String,
    pub hidden_size: usize,
    pub max_position_embeddings: usize,
    #[serde(flatten)]
    pub classifier_config: ClassifierConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub id2label: Option<HashMap<String, String>>,
}

impl Config {
    pub fn architecture(&self) -> Option<Architecture> {
        match self.model_type.as_str() {
            "bert" => Some(Architecture::Bert),
            "roberta" | "xlm-roberta" | "camembert" => Some(Architecture::XlmRoberta),
            _ => None,
        }
    }

    /// Longest token sequence the model accepts. RoBERTa-family position
    /// ids start after the padding index, which costs two slots.
    pub fn max_input_length(&self) -> usize {
        match self.architecture() {
            Some(Architecture::XlmRoberta) => self.max_position_embeddings.saturating_sub(2),
            _ => self.max_position_embeddings,
        }
    }
}

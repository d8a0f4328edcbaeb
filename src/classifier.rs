pub use candle_core::Device;
use crate::labels::{LabelSet, LabelSource};
use crate::model::bert::BertForSequenceClassification;
use crate::model::config::{Architecture, Config};
use crate::prediction::{probabilities, Prediction};
use candle_core::{DType, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::{bert, xlm_roberta};
use std::fs::File;
use std::path::{Path, PathBuf};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info, warn};

const NUM_LABELS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing model file: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("unsupported model type {0:?}")]
    UnsupportedArchitecture(String),
    #[error("label mismatch: {0}")]
    Labels(String),
    #[error("model produced {actual} class scores, expected {expected}")]
    OutputShape { expected: usize, actual: usize },
    #[error("model produced a non-finite class probability")]
    NonFinite,
}

impl From<tokenizers::Error> for Error {
    fn from(err: tokenizers::Error) -> Self {
        Self::Tokenizer(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Anything that can turn text into a sentiment prediction.
pub trait Classify: Send + Sync + 'static {
    fn classify(&self, text: &str) -> Result<Prediction>;
}

enum Backbone {
    Bert(BertForSequenceClassification),
    XlmRoberta(xlm_roberta::XLMRobertaForSequenceClassification),
}

/// A sequence-classification model and its tokenizer, loaded once and
/// shared read-only between requests.
pub struct SentimentClassifier {
    model: Backbone,
    labels: LabelSet,
    tokenizer: Tokenizer,
    device: Device,
}

impl SentimentClassifier {
    pub fn load<P: AsRef<Path>>(path: P, device: Device) -> Result<Self> {
        let dir = path.as_ref();

        let config_path = require(dir.join("config.json"))?;
        let raw: serde_json::Value = serde_json::from_reader(File::open(&config_path)?)?;
        let config: Config = serde_json::from_value(raw.clone())?;
        let architecture = config
            .architecture()
            .ok_or_else(|| Error::UnsupportedArchitecture(config.model_type.clone()))?;

        let (labels, source) =
            LabelSet::from_id2label(config.classifier_config.id2label.as_ref())
                .map_err(Error::Labels)?;
        if source == LabelSource::Fallback {
            warn!("config.json has no sentiment names in id2label, assuming negative/neutral/positive");
        }

        let mut tokenizer = Tokenizer::from_file(require(dir.join("tokenizer.json"))?)?;
        tokenizer
            .with_padding(None)
            .with_truncation(Some(TruncationParams {
                max_length: config.max_input_length(),
                ..Default::default()
            }))?;

        let model_builder = weights(dir, &device)?;
        let model = match architecture {
            Architecture::Bert => {
                let bert_config: bert::Config = serde_json::from_value(raw)?;
                Backbone::Bert(BertForSequenceClassification::load(
                    model_builder,
                    &bert_config,
                    config.hidden_size,
                    NUM_LABELS,
                )?)
            }
            Architecture::XlmRoberta => {
                let roberta_config: xlm_roberta::Config = serde_json::from_value(raw)?;
                Backbone::XlmRoberta(xlm_roberta::XLMRobertaForSequenceClassification::new(
                    NUM_LABELS,
                    &roberta_config,
                    model_builder,
                )?)
            }
        };

        info!(
            path = %dir.display(),
            ?architecture,
            labels = ?labels.iter().collect::<Vec<_>>(),
            max_length = config.max_input_length(),
            "model loaded"
        );
        Ok(Self {
            model,
            labels,
            tokenizer,
            device,
        })
    }

    /// Runs one throwaway prediction so that a model that loads but cannot
    /// run a forward pass fails at startup instead of per request. Head
    /// width is already fixed by the `NUM_LABELS`-wide linear layer at load.
    pub fn warm_up(&self) -> Result<()> {
        let probs = probabilities(&self.logits("")?)?;
        Prediction::from_probabilities(&self.labels, &probs)?;
        Ok(())
    }

    fn logits(&self, text: &str) -> Result<Tensor> {
        let encoding = self.tokenizer.encode(text, true)?;
        debug!(tokens = encoding.len(), "encoded input");

        let input_ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;
        let attention_mask =
            Tensor::new(encoding.get_attention_mask(), &self.device)?.unsqueeze(0)?;
        let logits = match &self.model {
            Backbone::Bert(model) => {
                let token_type_ids =
                    Tensor::new(encoding.get_type_ids(), &self.device)?.unsqueeze(0)?;
                model.forward(&input_ids, &token_type_ids, &attention_mask)?
            }
            Backbone::XlmRoberta(model) => {
                let token_type_ids = input_ids.zeros_like()?;
                model.forward(&input_ids, &attention_mask, &token_type_ids)?
            }
        };
        Ok(logits)
    }
}

impl Classify for SentimentClassifier {
    fn classify(&self, text: &str) -> Result<Prediction> {
        let probs = probabilities(&self.logits(text)?)?;
        let prediction = Prediction::from_probabilities(&self.labels, &probs)?;
        info!(
            sentiment = %prediction.sentiment,
            negative = prediction.probabilities.negative,
            neutral = prediction.probabilities.neutral,
            positive = prediction.probabilities.positive,
            "predicted"
        );
        Ok(prediction)
    }
}

fn require(path: PathBuf) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(Error::MissingFile(path))
    }
}

fn weights(dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = require(dir.join("model.safetensors"))?;
    Ok(unsafe { VarBuilder::from_mmaped_safetensors(&[&safetensors], DType::F32, device) }?)
}

//! BERT sequence classifier (primary hate-speech classifier)
//!
//! Mirrors a `BertForSequenceClassification` head: the encoder output for
//! `[CLS]` goes through the pooler (`dense` + tanh) and a linear layer, and
//! the predicted label is the softmax argmax.

use crate::classifier::{ClassificationMetadata, ClassificationResult, Classifier};
use crate::model_loader::{ModelConfig, ModelFiles, TokenizerFile, WeightsFile};
use async_trait::async_trait;
use candle_core::{DType, Device, IndexOp, Tensor, D};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use civitas_core::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokenizers::{Tokenizer, TruncationParams};

/// Label fields of a hub `config.json`
#[derive(Debug, Default, Deserialize)]
struct LabelConfig {
    #[serde(default)]
    id2label: Option<BTreeMap<String, String>>,
    #[serde(default)]
    num_labels: Option<usize>,
}

struct BertInner {
    tokenizer: Tokenizer,
    model: BertModel,
    pooler: Linear,
    head: Linear,
    device: Device,
    labels: Vec<String>,
}

/// Candle BERT classifier with a pooled sequence classification head
pub struct BertSequenceClassifier {
    name: String,
    inner: Arc<BertInner>,
}

impl BertSequenceClassifier {
    /// Resolve, download if needed, and load the model.
    ///
    /// This blocks on file and network IO; call it from a blocking context.
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let files = ModelFiles::resolve(config)?;
        let device = config.device.create()?;

        let config_json = std::fs::read_to_string(&files.config)?;
        let bert_config: BertConfig = serde_json::from_str(&config_json).map_err(|e| {
            Error::classifier(format!(
                "Failed to parse config {}: {}",
                files.config.display(),
                e
            ))
        })?;
        let label_config: LabelConfig = serde_json::from_str(&config_json)?;
        let labels = resolve_labels(label_config.id2label.as_ref(), label_config.num_labels);

        let tokenizer = load_tokenizer(&files.tokenizer, config.max_length)?;
        let vb = load_var_builder(&files.weights, &device)?;
        let (model, vb_backbone) = load_backbone(&vb, &bert_config)?;

        let hidden = bert_config.hidden_size;
        let pooler = candle_nn::linear(hidden, hidden, vb_backbone.pp("pooler").pp("dense"))
            .map_err(candle_err("Failed to load pooler"))?;
        let head = candle_nn::linear(hidden, labels.len(), vb.pp("classifier"))
            .map_err(candle_err("Failed to load classification head"))?;

        let name = config.display_name();
        tracing::info!(
            "Loaded BERT classifier '{}' with {} labels: {:?}",
            name,
            labels.len(),
            labels
        );

        Ok(Self {
            name,
            inner: Arc::new(BertInner {
                tokenizer,
                model,
                pooler,
                head,
                device,
                labels,
            }),
        })
    }

    /// Labels in model output order
    pub fn labels(&self) -> &[String] {
        &self.inner.labels
    }
}

impl BertInner {
    fn probabilities(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::classifier(format!("Tokenization failed: {}", e)))?;

        let input_ids = Tensor::new(encoding.get_ids(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(candle_err("Failed to create input tensor"))?;
        let token_type_ids = Tensor::new(encoding.get_type_ids(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(candle_err("Failed to create token type tensor"))?;

        let hidden_states = self
            .model
            .forward(&input_ids, &token_type_ids, None)
            .map_err(candle_err("Model forward pass failed"))?;

        let cls = hidden_states
            .i((.., 0, ..))
            .map_err(candle_err("Failed to get CLS token"))?;
        let pooled = self
            .pooler
            .forward(&cls)
            .and_then(|t| t.tanh())
            .map_err(candle_err("Pooler failed"))?;
        let logits = self
            .head
            .forward(&pooled)
            .map_err(candle_err("Classification head failed"))?;

        candle_nn::ops::softmax(&logits, D::Minus1)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(candle_err("Softmax failed"))
    }
}

#[async_trait]
impl Classifier for BertSequenceClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        let start = Instant::now();
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();

        let probs = tokio::task::spawn_blocking(move || inner.probabilities(&text))
            .await
            .map_err(|e| Error::classifier(format!("Inference task failed: {}", e)))??;

        let mut result = top_prediction(&self.inner.labels, &probs)?;
        result.metadata.model = Some(self.name.clone());
        result.latency_us = start.elapsed().as_micros() as u64;
        Ok(result)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn candle_err(context: &'static str) -> impl Fn(candle_core::Error) -> Error {
    move |e| Error::classifier(format!("{}: {}", context, e))
}

/// Labels ordered by class index.
///
/// Missing entries fall back to the `LABEL_{i}` naming transformers uses.
fn resolve_labels(id2label: Option<&BTreeMap<String, String>>, num_labels: Option<usize>) -> Vec<String> {
    let mut indexed: BTreeMap<usize, String> = id2label
        .into_iter()
        .flatten()
        .filter_map(|(idx, label)| idx.parse::<usize>().ok().map(|i| (i, label.clone())))
        .collect();

    let count = num_labels
        .unwrap_or(0)
        .max(indexed.keys().next_back().map_or(0, |max| max + 1))
        .max(2);

    (0..count)
        .map(|i| indexed.remove(&i).unwrap_or_else(|| format!("LABEL_{}", i)))
        .collect()
}

/// Pick the most probable label, the way a text-classification pipeline does
fn top_prediction(labels: &[String], probs: &[f32]) -> Result<ClassificationResult> {
    let (idx, score) = probs
        .iter()
        .copied()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .ok_or_else(|| Error::classifier("Model produced no scores"))?;

    let label = labels
        .get(idx)
        .cloned()
        .unwrap_or_else(|| format!("LABEL_{}", idx));

    let all_scores = labels
        .iter()
        .zip(probs.iter().copied())
        .map(|(label, p)| (label.clone(), p))
        .collect();

    Ok(ClassificationResult {
        label,
        score,
        metadata: ClassificationMetadata {
            model: None,
            all_scores: Some(all_scores),
        },
        latency_us: 0,
    })
}

fn load_tokenizer(file: &TokenizerFile, max_length: usize) -> Result<Tokenizer> {
    let mut tokenizer = match file {
        TokenizerFile::Json(path) => {
            tracing::debug!("Loading tokenizer from tokenizer.json");
            Tokenizer::from_file(path)
                .map_err(|e| Error::classifier(format!("Failed to load tokenizer.json: {}", e)))?
        }
        TokenizerFile::Vocab(path) => {
            tracing::debug!("Building tokenizer from vocab.txt");
            wordpiece_tokenizer(path)?
        }
    };

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| Error::classifier(format!("Failed to configure truncation: {}", e)))?;
    tokenizer.with_padding(None);

    Ok(tokenizer)
}

fn wordpiece_tokenizer(vocab_path: &Path) -> Result<Tokenizer> {
    use tokenizers::models::wordpiece::WordPiece;
    use tokenizers::normalizers::BertNormalizer;
    use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
    use tokenizers::processors::bert::BertProcessing;

    let wordpiece = WordPiece::from_file(vocab_path.to_string_lossy().as_ref())
        .unk_token("[UNK]".to_string())
        .build()
        .map_err(|e| Error::classifier(format!("Failed to build WordPiece model: {}", e)))?;

    let mut tokenizer = Tokenizer::new(wordpiece);
    let special_id = |token: &str| {
        tokenizer.token_to_id(token).ok_or_else(|| {
            Error::classifier(format!(
                "{} has no {} token",
                vocab_path.display(),
                token
            ))
        })
    };
    let sep = special_id("[SEP]")?;
    let cls = special_id("[CLS]")?;

    let lowercase = vocab_lowercases(vocab_path);
    tokenizer.with_normalizer(Some(BertNormalizer::new(true, true, None, lowercase)));
    tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));
    tokenizer.with_post_processor(Some(BertProcessing::new(
        ("[SEP]".to_string(), sep),
        ("[CLS]".to_string(), cls),
    )));

    Ok(tokenizer)
}

/// `do_lower_case` from a sibling `tokenizer_config.json`, true when absent
fn vocab_lowercases(vocab_path: &Path) -> bool {
    #[derive(Deserialize)]
    struct TokenizerConfig {
        do_lower_case: Option<bool>,
    }

    vocab_path
        .parent()
        .map(|dir| dir.join("tokenizer_config.json"))
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|json| serde_json::from_str::<TokenizerConfig>(&json).ok())
        .and_then(|config| config.do_lower_case)
        .unwrap_or(true)
}

fn load_var_builder(weights: &WeightsFile, device: &Device) -> Result<VarBuilder<'static>> {
    match weights {
        WeightsFile::SafeTensors(path) => {
            // SAFETY: the weights file is not modified while mapped.
            unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device) }
                .map_err(candle_err("Failed to load SafeTensors weights"))
        }
        WeightsFile::PyTorch(path) => VarBuilder::from_pth(path, DType::F32, device)
            .map_err(candle_err("Failed to load PyTorch weights")),
    }
}

/// Load the encoder, trying the usual checkpoint prefixes.
///
/// Returns the builder scoped to the prefix that worked so the pooler can be
/// loaded from the same place.
fn load_backbone(
    vb: &VarBuilder<'static>,
    config: &BertConfig,
) -> Result<(BertModel, VarBuilder<'static>)> {
    let mut errors = Vec::new();

    for prefix in ["bert", ""] {
        let scoped = if prefix.is_empty() {
            vb.clone()
        } else {
            vb.pp(prefix)
        };

        match BertModel::load(scoped.clone(), config) {
            Ok(model) => {
                tracing::debug!(
                    "Loaded BERT backbone from '{}'",
                    if prefix.is_empty() { "<root>" } else { prefix }
                );
                return Ok((model, scoped));
            }
            Err(e) => errors.push(format!(
                "{}: {}",
                if prefix.is_empty() { "<root>" } else { prefix },
                e
            )),
        }
    }

    Err(Error::classifier(format!(
        "Failed to load BERT backbone with tried prefixes [{}]",
        errors.join(" | ")
    )))
}

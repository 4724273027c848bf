//! ONNX Runtime models: sentence embedder and cross-encoder.
//!
//! Both expect a model directory holding `model.onnx` and `tokenizer.json`,
//! as exported for BERT-style sentence-transformers.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ndarray::ArrayViewD;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{EncodeInput, Encoding, Tokenizer};
use tracing::{debug, info};

use reel_core::{Embedder, ReelError, RelevanceScorer, Result};

use crate::similarity::l2_normalize;

/// all-MiniLM-L6-v2 output size.
const MINILM_DIM: usize = 384;

/// Sequence length cap. Movie descriptions fit comfortably.
const MAX_TOKENS: usize = 256;

const MODEL_FILE: &str = "model.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";

fn load_session(model_path: &Path, num_threads: usize) -> Result<Session> {
    info!("Loading ONNX model from {:?}", model_path);

    Session::builder()
        .map_err(|e| ReelError::embedding(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| ReelError::embedding(format!("Failed to set optimization level: {}", e)))?
        .with_intra_threads(num_threads)
        .map_err(|e| ReelError::embedding(format!("Failed to set thread count: {}", e)))?
        .commit_from_file(model_path)
        .map_err(|e| ReelError::embedding(format!("Failed to load model: {}", e)))
}

fn load_tokenizer(tokenizer_path: &Path) -> Result<Tokenizer> {
    info!("Loading tokenizer from {:?}", tokenizer_path);

    Tokenizer::from_file(tokenizer_path)
        .map_err(|e| ReelError::embedding(format!("Failed to load tokenizer: {}", e)))
}

/// Padded BERT inputs for a batch of encodings.
struct BatchInputs {
    batch_size: usize,
    max_len: usize,
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
    token_type_ids: Vec<i64>,
}

impl BatchInputs {
    fn new(encodings: &[Encoding]) -> Self {
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(MAX_TOKENS);
        let batch_size = encodings.len();

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();
            let len = ids.len().min(max_len);

            for j in 0..len {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
                token_type_ids[i * max_len + j] = types[j] as i64;
            }
        }

        Self {
            batch_size,
            max_len,
            input_ids,
            attention_mask,
            token_type_ids,
        }
    }

    /// Mask value at `(row, position)`.
    fn mask(&self, row: usize, position: usize) -> i64 {
        self.attention_mask[row * self.max_len + position]
    }
}

/// Run a BERT-style session and hand the first output to `extract`.
fn run_session<T>(
    session: &Mutex<Session>,
    inputs: &BatchInputs,
    extract: impl FnOnce(&ArrayViewD<'_, f32>) -> Result<T>,
) -> Result<T> {
    let shape = vec![inputs.batch_size, inputs.max_len];

    let input_ids = Tensor::from_array((shape.clone(), inputs.input_ids.clone()))
        .map_err(|e| ReelError::embedding(format!("Failed to create input tensor: {}", e)))?;
    let attention_mask = Tensor::from_array((shape.clone(), inputs.attention_mask.clone()))
        .map_err(|e| ReelError::embedding(format!("Failed to create mask tensor: {}", e)))?;
    let token_type_ids = Tensor::from_array((shape, inputs.token_type_ids.clone()))
        .map_err(|e| ReelError::embedding(format!("Failed to create type tensor: {}", e)))?;

    let mut session = session
        .lock()
        .map_err(|e| ReelError::embedding(format!("Failed to lock session: {}", e)))?;

    let outputs = session
        .run(ort::inputs![
            "input_ids" => input_ids,
            "attention_mask" => attention_mask,
            "token_type_ids" => token_type_ids
        ])
        .map_err(|e| ReelError::embedding(format!("Inference failed: {}", e)))?;

    let (_, output) = outputs
        .iter()
        .next()
        .ok_or_else(|| ReelError::embedding("No output tensor found"))?;

    let view = output
        .try_extract_array::<f32>()
        .map_err(|e| ReelError::embedding(format!("Failed to extract tensor: {}", e)))?;

    debug!("Output shape: {:?}", view.shape());
    extract(&view)
}

/// Sentence embedder, e.g. all-MiniLM-L6-v2.
pub struct OnnxEmbedder {
    /// ONNX inference session (wrapped in Mutex for interior mutability).
    session: Mutex<Session>,

    tokenizer: Tokenizer,

    dimension: usize,
}

impl OnnxEmbedder {
    /// Load `model.onnx` and `tokenizer.json` from a model directory.
    pub fn from_dir(model_dir: impl AsRef<Path>, num_threads: usize) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        Self::new(
            model_dir.join(MODEL_FILE),
            model_dir.join(TOKENIZER_FILE),
            num_threads,
        )
    }

    /// Create an embedder from explicit model and tokenizer paths.
    pub fn new(
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        num_threads: usize,
    ) -> Result<Self> {
        let session = load_session(model_path.as_ref(), num_threads)?;
        let tokenizer = load_tokenizer(tokenizer_path.as_ref())?;

        info!("Embedder initialized: dim={}, max_tokens={}", MINILM_DIM, MAX_TOKENS);

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimension: MINILM_DIM,
        })
    }

    /// Override the expected output dimension for other sentence-transformers.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| ReelError::embedding(format!("Tokenization failed: {}", e)))?;
        let inputs = BatchInputs::new(&encodings);

        debug!("Embedding batch: size={}, max_len={}", inputs.batch_size, inputs.max_len);

        let embeddings = run_session(&self.session, &inputs, |view| match view.shape() {
            // (batch, seq, hidden): token embeddings, mean pool over the mask
            [_, _, _] => Ok(mean_pool(view, &inputs)),
            // (batch, hidden): already pooled
            [batch, hidden] => Ok((0..*batch)
                .map(|i| l2_normalize((0..*hidden).map(|j| view[[i, j]]).collect()))
                .collect()),
            shape => Err(ReelError::embedding(format!(
                "Unexpected output shape: {:?}",
                shape
            ))),
        })?;

        if let Some(first) = embeddings.first() {
            if first.len() != self.dimension {
                return Err(ReelError::embedding(format!(
                    "Model produced {} dimensions, expected {}",
                    first.len(),
                    self.dimension
                )));
            }
        }

        Ok(embeddings)
    }
}

/// Masked mean pooling over a `(batch, seq, hidden)` view, L2 normalized.
fn mean_pool(view: &ArrayViewD<'_, f32>, inputs: &BatchInputs) -> Vec<Vec<f32>> {
    let shape = view.shape();
    let (seq_len, hidden_dim) = (shape[1], shape[2]);

    (0..inputs.batch_size)
        .map(|i| {
            let mut sum = vec![0.0f32; hidden_dim];
            let mut valid = 0usize;
            for j in 0..seq_len.min(inputs.max_len) {
                if inputs.mask(i, j) == 1 {
                    valid += 1;
                    for (k, s) in sum.iter_mut().enumerate() {
                        *s += view[[i, j, k]];
                    }
                }
            }
            if valid == 0 {
                return sum;
            }
            l2_normalize(sum.into_iter().map(|s| s / valid as f32).collect())
        })
        .collect()
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        // Session is not Send; inference runs on the calling task.
        self.embed_batch(texts)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| ReelError::embedding("No embedding returned"))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Cross-encoder relevance model, e.g. ms-marco-MiniLM-L-6-v2.
///
/// Scores are raw logits; higher means more relevant.
pub struct OnnxCrossEncoder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

impl OnnxCrossEncoder {
    /// Load `model.onnx` and `tokenizer.json` from a model directory.
    pub fn from_dir(model_dir: impl AsRef<Path>, num_threads: usize) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        let session = load_session(&model_dir.join(MODEL_FILE), num_threads)?;
        let tokenizer = load_tokenizer(&model_dir.join(TOKENIZER_FILE))?;
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }
}

#[async_trait]
impl RelevanceScorer for OnnxCrossEncoder {
    async fn score(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let pairs: Vec<EncodeInput> = documents.iter().map(|doc| (query, *doc).into()).collect();
        let encodings = self
            .tokenizer
            .encode_batch(pairs, true)
            .map_err(|e| ReelError::embedding(format!("Tokenization failed: {}", e)))?;
        let inputs = BatchInputs::new(&encodings);

        debug!("Cross-encoding {} pairs", inputs.batch_size);

        run_session(&self.session, &inputs, |view| match view.shape() {
            // (batch, 1) logits
            [batch, _] => Ok((0..*batch).map(|i| view[[i, 0]]).collect()),
            [batch] => Ok((0..*batch).map(|i| view[[i]]).collect()),
            shape => Err(ReelError::embedding(format!(
                "Unexpected cross-encoder output shape: {:?}",
                shape
            ))),
        })
    }
}

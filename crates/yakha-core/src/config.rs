//! Decoder configuration parsed from HuggingFace-style `config.json`.
//!
//! Only the scalar fields the block-assembly layer cares about are modelled
//! here; everything else in the checkpoint config is the loader's business.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

fn default_rope_theta() -> f64 {
    10_000.0
}

fn default_partial_rotary_factor() -> f64 {
    1.0
}

fn default_norm_eps() -> f64 {
    1e-5
}

/// Rotary-embedding scaling parameters, forwarded verbatim to the attention
/// unit (longrope, linear, dynamic NTK and friends).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RopeScalingConfig {
    #[serde(default, alias = "type")]
    pub rope_type: Option<String>,
    #[serde(default)]
    pub factor: Option<f64>,
    #[serde(default)]
    pub original_max_position_embeddings: Option<usize>,
    #[serde(default)]
    pub low_freq_factor: Option<f64>,
    #[serde(default)]
    pub high_freq_factor: Option<f64>,
}

/// Scalar configuration shared by all decoder families.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecoderConfig {
    pub hidden_size: usize,
    pub num_attention_heads: usize,
    #[serde(default)]
    pub num_key_value_heads: Option<usize>,
    /// Per-head dimension override; some checkpoints (Gemma-7B, Qwen3) use a
    /// head dimension that is not `hidden_size / num_attention_heads`.
    #[serde(default)]
    pub head_dim: Option<usize>,
    #[serde(default)]
    pub intermediate_size: Option<usize>,
    pub max_position_embeddings: usize,
    #[serde(default = "default_rope_theta")]
    pub rope_theta: f64,
    #[serde(default = "default_partial_rotary_factor")]
    pub partial_rotary_factor: f64,
    #[serde(default = "default_norm_eps", alias = "layer_norm_eps")]
    pub rms_norm_eps: f64,
    #[serde(default)]
    pub attn_logit_softcapping: Option<f64>,
    #[serde(default)]
    pub rope_scaling: Option<RopeScalingConfig>,
    #[serde(default)]
    pub model_type: Option<String>,
}

impl DecoderConfig {
    /// Resolved per-head dimension: the override wins over the quotient.
    pub fn head_dim(&self) -> usize {
        self.head_dim
            .unwrap_or(self.hidden_size / self.num_attention_heads)
    }

    /// Number of key/value heads; defaults to full multi-head attention.
    pub fn num_kv_heads(&self) -> usize {
        self.num_key_value_heads
            .unwrap_or(self.num_attention_heads)
    }

    pub fn kv_groups(&self) -> usize {
        self.num_attention_heads / self.num_kv_heads()
    }

    /// Read a checkpoint `config.json`.
    ///
    /// Multimodal checkpoints nest the decoder settings under `text_config`;
    /// when that key is present it is unwrapped before deserializing.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path).map_err(|e| {
            Error::ModelLoadError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&config_str)
    }

    pub fn from_json_str(config_str: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(config_str)?;
        let source = root.get("text_config").cloned().unwrap_or(root);
        serde_json::from_value(source).map_err(Error::from)
    }
}

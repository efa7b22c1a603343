//! Model family identification and capability helpers.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Decoder architecture families with a supported block wiring.
///
/// `Llama` covers the close relatives that share its block diagram verbatim
/// (Mistral, Aquila). Families whose wiring differs, even by a single norm
/// placement, get their own variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    Llama,
    Mixtral,
    Qwen,
    Gemma2,
    Cohere,
    Mpt,
    Falcon,
    Phi3,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 8] = [
        ModelFamily::Llama,
        ModelFamily::Mixtral,
        ModelFamily::Qwen,
        ModelFamily::Gemma2,
        ModelFamily::Cohere,
        ModelFamily::Mpt,
        ModelFamily::Falcon,
        ModelFamily::Phi3,
    ];

    /// Parse a HuggingFace `model_type` string.
    pub fn from_model_type(model_type: &str) -> Result<Self, Error> {
        match model_type.trim().to_ascii_lowercase().as_str() {
            "llama" | "mistral" | "aquila" => Ok(ModelFamily::Llama),
            "mixtral" => Ok(ModelFamily::Mixtral),
            "qwen2" | "qwen3" => Ok(ModelFamily::Qwen),
            "gemma2" => Ok(ModelFamily::Gemma2),
            "cohere" => Ok(ModelFamily::Cohere),
            "mpt" => Ok(ModelFamily::Mpt),
            "falcon" | "refinedweb" | "refinedwebmodel" => Ok(ModelFamily::Falcon),
            "phi3" | "phi-3" => Ok(ModelFamily::Phi3),
            other => Err(Error::UnsupportedFamily(other.to_string())),
        }
    }

    /// ALiBi position bias instead of rotary embeddings.
    pub fn uses_alibi(&self) -> bool {
        matches!(self, ModelFamily::Mpt)
    }

    /// GPT-NeoX rotary layout (halved rotation) vs. GPT-J interleaved.
    /// Cohere checkpoints use the interleaved layout.
    pub fn neox_rotary(&self) -> bool {
        !matches!(self, ModelFamily::Cohere | ModelFamily::Mpt)
    }

    /// Number of normalization stages in one decoder block.
    pub fn norm_count(&self) -> usize {
        match self {
            ModelFamily::Cohere => 1,
            ModelFamily::Gemma2 => 4,
            // Falcon's parallel arch has two, its legacy arch one; report
            // the parallel layout used by every current checkpoint.
            _ => 2,
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelFamily::Llama => "llama",
            ModelFamily::Mixtral => "mixtral",
            ModelFamily::Qwen => "qwen",
            ModelFamily::Gemma2 => "gemma2",
            ModelFamily::Cohere => "cohere",
            ModelFamily::Mpt => "mpt",
            ModelFamily::Falcon => "falcon",
            ModelFamily::Phi3 => "phi3",
        };
        f.write_str(name)
    }
}

impl FromStr for ModelFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelFamily::from_model_type(s)
    }
}

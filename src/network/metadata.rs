use serde::{Deserialize, Serialize};

/// Everything needed to turn a raw image into network input and the network
/// output back into text. Stored alongside the weights in model JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub charset: String,
    pub width: u32,
    pub height: u32,
    pub max_len: usize,
    #[serde(default)]
    pub description: Option<String>,
}

//! Typed generation parameters and their worker request mapping.
//!
//! Callers describe a generation in host terms; [`GenerationParams`]
//! translates it verbatim by key into the worker's request schema,
//! carrying unrecognized keys through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// User-facing generation request for a serverless backend.
///
/// Unknown fields land in `extra` and are passed through to the worker
/// under their own names, without overriding the typed fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Positive prompt text.
    pub prompt: String,
    /// Negative prompt text.
    pub negative_prompt: String,
    /// Model to generate with. Empty leaves the worker's current model
    /// in place.
    pub model: String,
    /// Number of images to produce.
    pub images: u32,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    /// Random seed; `-1` asks the worker to pick one.
    pub seed: i64,
    /// Optional VAE model name.
    pub vae: Option<String>,
    /// Base64-encoded init image for img2img, without a data-URI
    /// prefix.
    pub init_image: Option<String>,
    /// Denoising strength applied when `init_image` is set.
    pub creativity: f64,
    /// LoRA model names to apply.
    pub loras: Vec<String>,
    /// Optional sampler override.
    pub sampler: Option<String>,
    /// Optional scheduler override.
    pub scheduler: Option<String>,
    /// Unrecognized keys, passed through verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: String::new(),
            model: String::new(),
            images: 1,
            width: 1024,
            height: 1024,
            steps: 20,
            cfg_scale: 7.0,
            seed: -1,
            vae: None,
            init_image: None,
            creativity: 0.6,
            loras: Vec::new(),
            sampler: None,
            scheduler: None,
            extra: Map::new(),
        }
    }
}

impl GenerationParams {
    /// Build the worker's generation request body.
    ///
    /// Key names follow the worker API, not this struct: the negative
    /// prompt goes out as `negativeprompt`, the CFG scale as
    /// `cfgscale`, the init image as a `data:image/png;base64,` URI
    /// under `initimage`. Optional fields are omitted when unset, and
    /// `extra` keys never override the typed ones.
    pub fn to_worker_request(&self, session_id: &str) -> Value {
        let mut request = Map::new();
        request.insert("session_id".to_string(), json!(session_id));
        request.insert("images".to_string(), json!(self.images));
        request.insert("prompt".to_string(), json!(self.prompt));
        request.insert("negativeprompt".to_string(), json!(self.negative_prompt));
        request.insert("model".to_string(), json!(self.model));
        request.insert("width".to_string(), json!(self.width));
        request.insert("height".to_string(), json!(self.height));
        request.insert("steps".to_string(), json!(self.steps));
        request.insert("cfgscale".to_string(), json!(self.cfg_scale));
        request.insert("seed".to_string(), json!(self.seed));

        if let Some(vae) = &self.vae {
            request.insert("vae".to_string(), json!(vae));
        }

        if let Some(init_image) = &self.init_image {
            request.insert(
                "initimage".to_string(),
                json!(format!("data:image/png;base64,{init_image}")),
            );
            request.insert("creativity".to_string(), json!(self.creativity));
        }

        if !self.loras.is_empty() {
            request.insert("loras".to_string(), json!(self.loras));
        }

        if let Some(sampler) = self.sampler.as_deref().filter(|s| !s.trim().is_empty()) {
            request.insert("sampler".to_string(), json!(sampler));
        }

        if let Some(scheduler) = self.scheduler.as_deref().filter(|s| !s.trim().is_empty()) {
            request.insert("scheduler".to_string(), json!(scheduler));
        }

        for (key, value) in &self.extra {
            request.entry(key.clone()).or_insert_with(|| value.clone());
        }

        Value::Object(request)
    }
}

/// Flip the `.safetensors` suffix on a model name: strip it when
/// present, append it otherwise.
///
/// Workers are inconsistent about whether model identifiers carry the
/// file extension, so a rejected selection is retried exactly once
/// with the toggled form.
pub fn toggle_model_extension(name: &str) -> String {
    match name.strip_suffix(".safetensors") {
        Some(stripped) => stripped.to_string(),
        None => format!("{name}.safetensors"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use serde_json::Value;

use super::image::InlineImage;

pub const MIN_IMAGES: u8 = 1;
pub const MAX_IMAGES: u8 = 4;

/// Parameters for one logical image-generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// The prompt for image generation
    pub prompt: String,

    /// Number of images to generate (1-4)
    pub count: u8,

    /// Requested model id; None means the configured default
    pub model: Option<String>,

    /// Reference image for img2img
    pub reference_image: Option<InlineImage>,

    /// How far an edit may depart from the reference (0-1)
    pub strength: f32,

    pub guidance_scale: f32,

    pub num_inference_steps: u32,

    /// Optional negative prompt (what to avoid)
    pub negative_prompt: Option<String>,

    /// Optional seed for reproducibility
    pub seed: Option<u64>,

    /// Wrap the prompt in context and quality phrases
    pub enhance: bool,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            count: 1,
            model: None,
            reference_image: None,
            strength: 0.75,
            guidance_scale: 7.5,
            num_inference_steps: 25,
            negative_prompt: None,
            seed: None,
            enhance: true,
        }
    }
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_count(mut self, count: u8) -> Self {
        self.count = count.clamp(MIN_IMAGES, MAX_IMAGES);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_negative_prompt(mut self, neg: impl Into<String>) -> Self {
        self.negative_prompt = Some(neg.into());
        self
    }

    pub fn with_reference_image(mut self, image: InlineImage) -> Self {
        self.reference_image = Some(image);
        self
    }

    pub fn with_enhance(mut self, enhance: bool) -> Self {
        self.enhance = enhance;
        self
    }

    /// Check if this is an edit request (has reference image)
    pub fn is_edit(&self) -> bool {
        self.reference_image.is_some()
    }
}

/// Turn whatever the client sent as `count` into 1..=4.
///
/// Numbers and numeric strings are truncated then clamped; anything else,
/// including zero and NaN, counts as 1.
pub fn clamp_count(value: Option<&Value>) -> u8 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match raw {
        Some(n) if n.is_finite() && n != 0.0 => {
            n.clamp(MIN_IMAGES as f64, MAX_IMAGES as f64).trunc() as u8
        }
        _ => MIN_IMAGES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clamp_count() {
        let cases = [
            (json!(0), 1),
            (json!(1), 1),
            (json!(3), 3),
            (json!(4), 4),
            (json!(5), 4),
            (json!(-1), 1),
            (json!(2.7), 2),
            (json!("3"), 3),
            (json!("abc"), 1),
            (json!(null), 1),
            (json!(true), 1),
            (json!([2]), 1),
        ];
        for (input, expected) in cases {
            assert_eq!(clamp_count(Some(&input)), expected, "count {}", input);
        }
        assert_eq!(clamp_count(None), 1);
    }

    #[test]
    fn test_builder_clamps() {
        assert_eq!(GenerationRequest::new("x").with_count(9).count, 4);
        assert_eq!(GenerationRequest::new("x").with_count(0).count, 1);
    }

    #[test]
    fn test_is_edit() {
        let request = GenerationRequest::new("x");
        assert!(!request.is_edit());
        let image = InlineImage {
            mime_type: "image/png".to_string(),
            data: String::new(),
        };
        assert!(request.with_reference_image(image).is_edit());
    }
}

use rand::seq::SliceRandom;
use rand::Rng;

/// Leading context for text-to-image prompts
pub const GENERATE_CONTEXTS: &[&str] = &[
    "award-winning professional photograph,",
    "masterpiece digital artwork,",
    "high-end artistic render,",
    "cinematic film still,",
    "editorial magazine photography,",
];

/// Leading context for reference-image edits
pub const EDIT_CONTEXTS: &[&str] = &[
    "professional photo retouch:",
    "expert digital art edit:",
    "high-end studio post-production:",
    "fine-art reinterpretation:",
    "editorial image revision:",
];

pub const QUALITY_SUFFIXES: &[&str] = &[
    ", highly detailed, professional lighting, 8k resolution, sharp focus",
    ", artstation trending, hyperrealistic, detailed textures",
    ", photorealistic, studio quality, masterful composition",
    ", ultra sharp, rich colors, balanced exposure",
    ", intricate detail, soft natural light, high dynamic range",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Generate,
    Edit,
}

/// Wrap a prompt in a random context phrase and quality suffix.
///
/// With `enhance` off the prompt is returned untouched. Otherwise the result
/// always contains the original prompt verbatim.
pub fn enhance_prompt<R: Rng + ?Sized>(
    prompt: &str,
    enhance: bool,
    mode: PromptMode,
    rng: &mut R,
) -> String {
    if !enhance {
        return prompt.to_string();
    }

    let contexts = match mode {
        PromptMode::Generate => GENERATE_CONTEXTS,
        PromptMode::Edit => EDIT_CONTEXTS,
    };
    let context = contexts.choose(rng).copied().unwrap_or_default();
    let quality = QUALITY_SUFFIXES.choose(rng).copied().unwrap_or_default();

    match mode {
        PromptMode::Generate => format!("{} {}{}", context, prompt, quality),
        PromptMode::Edit => format!(
            "{} {}. Preserve the composition of the source image{}",
            context, prompt, quality
        ),
    }
}

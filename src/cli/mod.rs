pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "studio",
    version,
    about = "Prompt Studio - chat and image generation across OpenAI, Gemini, HuggingFace and Pollinations",
    long_about = r#"Prompt Studio - chat and image generation across OpenAI, Gemini, HuggingFace and Pollinations

An HTTP gateway a browser UI can talk to, plus a CLI that drives the same pipeline.
Run without arguments to start the server.

SETUP:
  Pollinations works without a key. Add providers via environment or config:
    export HF_TOKEN=hf_...
    export OPENAI_API_KEY=sk-...
    export GEMINI_API_KEY=...
    studio config set credentials.huggingface_token hf_...

EXAMPLES:
  Start the gateway:
    studio
    studio serve --bind 0.0.0.0:8080

  Generate images:
    studio generate "a lighthouse at dusk"
    studio g "isometric city" -n 4 --model flux-schnell

  Edit an existing image:
    studio edit photo.png "make it look like a watercolor painting"

  Chat:
    studio chat "suggest three names for a bakery"
    studio chat --companion "good morning!"

  List models and which ones are usable:
    studio models

OUTPUT FORMATS:
  --format text   Human-readable output (default)
  --format json   Machine-readable JSON
  --format quiet  Minimal output, just file paths"#,
    after_help = r#"CONFIGURATION:
  Config file: see `studio config path`
  Logging: RUST_LOG (default warn,studio=info,tower_http=info)

HTTP ENDPOINTS:
  POST /generate   POST /chat   POST /companion   GET /models   GET /healthz"#
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP gateway
    ///
    /// Serves /generate, /chat, /companion and /models. This is the default
    /// when no subcommand is given.
    #[command(alias = "s")]
    Serve(commands::serve::ServeArgs),

    /// Generate images from a text prompt
    ///
    /// Picks a usable model, optionally enriches the prompt, and requests up
    /// to four images in parallel. Images are saved to the output directory.
    #[command(
        alias = "g",
        after_help = r#"EXAMPLES:
  Basic generation:
    studio generate "a red apple on a wooden table"

  Several variations with a fixed seed:
    studio generate "paper lantern festival" -n 4 --seed 1234

  Exact prompt, no enrichment:
    studio generate "a red apple" --no-enhance

  JSON output:
    studio generate "abstract art" --format json"#
    )]
    Generate(commands::generate::GenerateArgs),

    /// Edit an existing image using a text prompt
    ///
    /// Sends the image as a reference. Models that cannot take a reference
    /// image are swapped for one that can.
    #[command(
        alias = "e",
        after_help = r#"EXAMPLES:
  Change style:
    studio edit image.jpg "convert to pencil sketch style"

  Keep closer to the source:
    studio edit scene.png "change the sky to sunset colors" --strength 0.4"#
    )]
    Edit(commands::edit::EditArgs),

    /// Chat with the configured model
    #[command(alias = "c")]
    Chat(commands::chat::ChatArgs),

    /// List known models and whether they are usable
    #[command(alias = "m")]
    Models(commands::models::ModelsArgs),

    /// View or modify configuration
    ///
    /// Manage credentials, provider URLs and default parameters.
    /// Changes are saved to the config file immediately.
    #[command(after_help = r#"EXAMPLES:
  Show all settings:
    studio config show

  Set values:
    studio config set credentials.huggingface_token hf_...
    studio config set defaults.image_model flux-schnell
    studio config set server.bind 0.0.0.0:8080

  Reset to defaults:
    studio config reset --force"#)]
    Config(commands::config::ConfigArgs),
}

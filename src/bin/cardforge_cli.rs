//! CardForge CLI - render profile artifacts from the command line
//!
//! Commands: validate, qr, qr-all, card, pass, vcard, verify-pass
//! Outputs a JSON summary to stdout, logs to stderr.
//! Returns 2 on validation failure, 1 on any other failure.

use clap::{Parser, Subcommand};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use cardforge_core::{
    verify_pass, ArtifactRequest, CardService, Color, Disposition, Preset, Profile, RenderConfig,
    RenderError, Style, Variant,
};

#[derive(Parser)]
#[command(name = "cardforge-cli")]
#[command(about = "CardForge CLI - Digital Identity Card Renderer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON render configuration
    #[arg(short, long, default_value = "cardforge.json")]
    config: PathBuf,

    /// Override the base URL used for canonical card links
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a profile
    Validate {
        #[arg(short, long)]
        profile: PathBuf,
    },

    /// Render one encoded-link variant
    Qr {
        #[arg(short, long)]
        profile: PathBuf,

        /// standard, small, large, branded, trackable or custom
        #[arg(short, long, default_value = "standard")]
        variant: Variant,

        /// Pixel size for trackable/custom
        #[arg(long, default_value_t = 300)]
        size: u32,

        /// Module color for trackable/custom
        #[arg(long, default_value = "#000000")]
        dark: Color,

        /// Background color for trackable/custom
        #[arg(long, default_value = "#ffffff")]
        light: Color,

        /// utm_medium for trackable
        #[arg(long, default_value = "print")]
        medium: String,

        #[arg(short, long)]
        out: PathBuf,
    },

    /// Render every standard variant into a directory
    QrAll {
        #[arg(short, long)]
        profile: PathBuf,

        #[arg(short, long)]
        out_dir: PathBuf,
    },

    /// Render the composite card image
    Card {
        #[arg(short, long)]
        profile: PathBuf,

        #[arg(short, long)]
        out: PathBuf,
    },

    /// Build the wallet pass archive
    Pass {
        #[arg(short, long)]
        profile: PathBuf,

        #[arg(short, long)]
        out: PathBuf,
    },

    /// Write the contact record
    Vcard {
        #[arg(short, long)]
        profile: PathBuf,

        #[arg(short, long)]
        out: PathBuf,
    },

    /// Check a pass archive's manifest against its entries
    VerifyPass {
        #[arg(short, long)]
        archive: PathBuf,
    },
}

fn load_profile(path: &Path) -> Result<Profile, RenderError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn exit_for(e: &RenderError) -> ExitCode {
    let output = json!({
        "success": false,
        "error": e.to_string(),
        "status": e.status_code(),
    });
    println!("{}", output);
    match e {
        RenderError::InvalidProfile(_) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

fn write_artifact(
    service: &CardService,
    profile: &Profile,
    request: ArtifactRequest,
    out: &Path,
) -> Result<serde_json::Value, RenderError> {
    let artifact = service.render(profile, &request, Disposition::Attachment)?;
    fs::write(out, &artifact.bytes)?;
    Ok(json!({
        "success": true,
        "path": out,
        "contentType": artifact.content_type,
        "contentDisposition": artifact.content_disposition(),
        "bytes": artifact.bytes.len(),
    }))
}

fn preset_for(variant: Variant, profile: &Profile, style: Style, medium: &str) -> Preset {
    match variant {
        Variant::Standard => Preset::Standard,
        Variant::Small => Preset::Small,
        Variant::Large => Preset::Large,
        Variant::Branded => Preset::Branded(profile.theme),
        Variant::Trackable => Preset::trackable(style, medium),
        Variant::Custom => Preset::Custom(style),
    }
}

fn run(cli: Cli) -> Result<serde_json::Value, RenderError> {
    let mut config = RenderConfig::load_from_file(&cli.config)?;
    if let Some(base_url) = cli.base_url {
        config = config.with_base_url(base_url);
    }
    // Built on demand: verify-pass never loads fonts.
    let service = move || CardService::new(config);

    match cli.command {
        Commands::Validate { profile } => {
            let profile = load_profile(&profile)?;
            let result = service()?.validate(&profile);
            if !result.valid {
                return Err(RenderError::InvalidProfile(result.summary()));
            }
            Ok(json!({ "success": true, "validation": result }))
        }

        Commands::Qr { profile, variant, size, dark, light, medium, out } => {
            let profile = load_profile(&profile)?;
            let preset = preset_for(variant, &profile, Style { size, dark, light }, &medium);
            write_artifact(&service()?, &profile, ArtifactRequest::Link(preset), &out)
        }

        Commands::QrAll { profile, out_dir } => {
            let profile = load_profile(&profile)?;
            let links = service()?.generate_all(&profile)?;
            fs::create_dir_all(&out_dir)?;
            let mut written = vec![];
            for link in &links {
                let path = out_dir.join(format!("{}-{}.png", profile.identifier, link.variant));
                fs::write(&path, &link.png)?;
                written.push(json!({ "link": link, "path": path }));
            }
            Ok(json!({ "success": true, "links": written }))
        }

        Commands::Card { profile, out } => {
            write_artifact(&service()?, &load_profile(&profile)?, ArtifactRequest::Card, &out)
        }
        Commands::Pass { profile, out } => {
            write_artifact(&service()?, &load_profile(&profile)?, ArtifactRequest::Pass, &out)
        }
        Commands::Vcard { profile, out } => {
            write_artifact(&service()?, &load_profile(&profile)?, ArtifactRequest::Contact, &out)
        }

        Commands::VerifyPass { archive } => {
            let manifest = verify_pass(&fs::read(archive)?)?;
            Ok(json!({ "success": true, "manifest": manifest }))
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output).unwrap_or_else(|_| output.to_string()));
            ExitCode::SUCCESS
        }
        Err(e) => exit_for(&e),
    }
}

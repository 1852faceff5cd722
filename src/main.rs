use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use soil_profile_loader::{
    hydraulics::ka5,
    io,
    models::{classify, declassify, TextureClass},
    visualization::{print_hydraulics, print_profile_list, print_profile_table, print_texture},
    LoaderConfig, ProfileCache, ReferenceTableStore,
};

#[derive(Parser)]
#[command(
    name = "soil-loader",
    about = "Soil profile loader - KA5 layer parameters from horizon data",
    version,
    author
)]
struct Cli {
    /// Path to the loader configuration (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the discretized layers of one soil profile
    Profile {
        /// Soil profile id
        #[arg(short, long)]
        id: i64,

        /// Print the layers as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Tag JSON values with their units
        #[arg(long)]
        units: bool,
    },

    /// List the loaded and rejected profiles of the configured source
    List,

    /// Derive saturation, field capacity and wilting point for one texture
    Derive {
        /// KA5 texture class, e.g. Ls3
        #[arg(short, long)]
        texture: String,

        /// Raw density in g/cm3
        #[arg(short, long)]
        density: f64,

        /// Organic matter in percent
        #[arg(short, long, default_value = "0.0")]
        organic_matter: f64,

        /// Stone content as volume fraction (0.0-1.0)
        #[arg(short, long, default_value = "0.0")]
        stone: f64,

        /// Also show the capillary rise rate at this groundwater distance in dm
        #[arg(long)]
        groundwater_distance: Option<u32>,
    },

    /// Classify a sand/clay pair into a KA5 texture class
    Classify {
        /// Sand content as mass fraction (0.0-1.0)
        #[arg(long)]
        sand: f64,

        /// Clay content as mass fraction (0.0-1.0)
        #[arg(long)]
        clay: f64,
    },

    /// Show the representative composition of a KA5 texture class
    Texture {
        /// KA5 texture class code
        code: String,
    },

    /// Export every profile of the configured source
    Export {
        /// Output file path (.json or .csv)
        #[arg(short, long)]
        output: PathBuf,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Tag JSON values with their units
        #[arg(long)]
        units: bool,
    },
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("soil_profile_loader=info,warn"),
        _ => EnvFilter::new("soil_profile_loader=debug,info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<LoaderConfig> {
    let path = path.context("this command needs a configuration file, pass --config <PATH>")?;
    LoaderConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

fn load_cache(config: &LoaderConfig) -> Result<ProfileCache> {
    Ok(ProfileCache::new(config.settings(), config.reference_source()?)?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Profile { id, json, units } => {
            let config = load_config(config_path)?;
            let cache = load_cache(&config)?;
            let source = config.horizon_source()?;
            let profile = cache.get_profile(source.as_ref(), id)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&profile.to_json(units))?);
            } else {
                print_profile_table(&profile);
            }
        }

        Commands::List => {
            let config = load_config(config_path)?;
            let cache = load_cache(&config)?;
            let source = config.horizon_source()?;
            let loaded = cache.profiles(source.as_ref())?;
            print_profile_list(&loaded);
        }

        Commands::Derive {
            texture,
            density,
            organic_matter,
            stone,
            groundwater_distance,
        } => {
            let texture: TextureClass = texture.parse()?;
            if !(0.0..=1.0).contains(&stone) {
                anyhow::bail!("Stone content must be between 0.0 and 1.0, got {stone}");
            }
            let config = load_config(config_path)?;
            let tables = ReferenceTableStore::new().tables(config.reference_source()?);
            let hydraulics = ka5::derive(&tables, texture, stone, density, organic_matter)?;
            print_hydraulics(texture, &hydraulics);

            if let Some(distance) = groundwater_distance {
                match tables.capillary_rate(texture, distance)? {
                    Some(rate) => println!(
                        "\n  Capillary rise at {distance} dm: {}",
                        format!("{rate:.2} mm/d").bold()
                    ),
                    None => println!(
                        "\n  {}: no capillary rise rate for {texture} at {distance} dm",
                        "Warning".yellow()
                    ),
                }
            }
        }

        Commands::Classify { sand, clay } => {
            let texture = classify(sand, clay)?;
            println!("{}", texture.code());
        }

        Commands::Texture { code } => {
            let texture: TextureClass = code.parse()?;
            print_texture(texture, &declassify(texture));
        }

        Commands::Export {
            output,
            pretty,
            units,
        } => {
            let config = load_config(config_path)?;
            let cache = load_cache(&config)?;
            let source = config.horizon_source()?;
            let loaded = cache.profiles(source.as_ref())?;

            let out_ext = output
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            match out_ext.as_str() {
                "json" => io::write_profiles_json(loaded.profiles(), &output, pretty, units)?,
                "csv" => io::write_layers_csv(loaded.profiles(), &output)?,
                _ => anyhow::bail!("Unsupported output format: .{out_ext}. Use .json or .csv"),
            }

            println!(
                "{} Exported {} profiles to {}",
                "Done.".green().bold(),
                loaded.len(),
                output.display()
            );
            if !loaded.rejected().is_empty() {
                eprintln!(
                    "{}: {} profiles were rejected, run `list` for details",
                    "Warning".yellow(),
                    loaded.rejected().len()
                );
            }
        }
    }

    Ok(())
}

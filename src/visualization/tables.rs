use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, ContentArrangement, Table};

use crate::hydraulics::Hydraulics;
use crate::models::{SandClay, SoilProfile, TextureClass};
use crate::profile::SourceProfiles;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn opt(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{v:.precision$}"))
        .unwrap_or_else(|| "-".to_string())
}

/// Format the layers of one profile as a string.
pub fn format_profile_table(profile: &SoilProfile) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "\n{}\n",
        format!("Soil Profile {}", profile.id).bold().green()
    ));
    output.push_str(&format!(
        "{}\n",
        format!(
            "{} layers of {} cm | {} | {:.0} mm plant-available water",
            profile.num_layers(),
            profile.layer_thickness_cm,
            profile.texture_summary(),
            profile.available_water_mm()
        )
        .dimmed()
    ));
    output.push_str(&format!("{}\n", "=".repeat(70)));

    let mut table = new_table();
    table.set_header(vec![
        "Depth (cm)",
        "Texture",
        "Sand",
        "Clay",
        "SOC",
        "Raw dens. (kg/m3)",
        "Sat",
        "FC",
        "PWP",
        "Lambda",
    ]);

    let thickness = profile.layer_thickness_cm;
    for (index, layer) in profile.layers.iter().enumerate() {
        let top = index as u32 * thickness;
        table.add_row(vec![
            Cell::new(format!("{}-{}", top, top + thickness)),
            Cell::new(layer.texture.map(|t| t.code()).unwrap_or("-")),
            Cell::new(opt(layer.sand, 2)),
            Cell::new(opt(layer.clay, 2)),
            Cell::new(opt(layer.organic_carbon(), 4)),
            Cell::new(opt(layer.raw_density(), 0)),
            Cell::new(opt(layer.saturation, 3)),
            Cell::new(opt(layer.field_capacity, 3)),
            Cell::new(opt(layer.permanent_wilting_point, 3)),
            Cell::new(opt(layer.lambda, 3)),
        ]);
    }

    output.push_str(&format!("{table}"));
    output
}

/// Print the layers of one profile.
pub fn print_profile_table(profile: &SoilProfile) {
    println!("{}", format_profile_table(profile));
}

/// Format the loaded and rejected profiles of a source as a string.
pub fn format_profile_list(loaded: &SourceProfiles) -> String {
    let mut output = String::new();
    output.push_str(&format!("\n{}\n", "Soil Profiles".bold().green()));
    output.push_str(&format!(
        "{}\n",
        format!(
            "Source: {} | {} loaded | {} rejected",
            loaded.source_id(),
            loaded.len(),
            loaded.rejected().len()
        )
        .dimmed()
    ));
    output.push_str(&format!("{}\n", "=".repeat(60)));

    let mut table = new_table();
    table.set_header(vec!["Id", "Layers", "Depth (m)", "Textures", "AWC (mm)"]);
    for profile in loaded.profiles() {
        table.add_row(vec![
            Cell::new(profile.id),
            Cell::new(profile.num_layers()),
            Cell::new(format!("{:.2}", profile.total_depth_m())),
            Cell::new(profile.texture_summary()),
            Cell::new(format!("{:.0}", profile.available_water_mm())),
        ]);
    }
    output.push_str(&format!("{table}"));

    if !loaded.rejected().is_empty() {
        output.push_str(&format!("\n\n{}\n", "Rejected".bold().yellow()));
        for (id, reason) in loaded.rejected() {
            output.push_str(&format!("  {} {}\n", format!("{id}:").yellow(), reason));
        }
    }
    output
}

/// Print the profile listing of a source.
pub fn print_profile_list(loaded: &SourceProfiles) {
    println!("{}", format_profile_list(loaded));
}

/// Format derived hydraulics of a texture as a string.
pub fn format_hydraulics(texture: TextureClass, hydraulics: &Hydraulics) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "\n{}\n",
        format!("KA5 Characteristics ({texture})").bold().green()
    ));
    output.push_str(&format!("{}\n", "=".repeat(50)));

    let mut table = new_table();
    table.set_header(vec!["Metric", "Value", "Unit"]);
    let rows = [
        ("Saturation", hydraulics.saturation),
        ("Field Capacity", hydraulics.field_capacity),
        ("Permanent Wilting Point", hydraulics.permanent_wilting_point),
        ("Available Water", hydraulics.available_water()),
    ];
    for (name, value) in rows {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(format!("{value:.4}")),
            Cell::new("m3/m3"),
        ]);
    }

    output.push_str(&format!("{table}"));
    output
}

/// Print derived hydraulics.
pub fn print_hydraulics(texture: TextureClass, hydraulics: &Hydraulics) {
    println!("{}", format_hydraulics(texture, hydraulics));
}

/// Format the representative composition of a texture class as a string.
pub fn format_texture(texture: TextureClass, composition: &SandClay) -> String {
    let mut table = new_table();
    table.set_header(vec!["Class", "Sand", "Clay", "Silt"]);
    table.add_row(vec![
        Cell::new(texture.code()),
        Cell::new(format!("{:.2}", composition.sand)),
        Cell::new(format!("{:.2}", composition.clay)),
        Cell::new(format!("{:.2}", composition.silt())),
    ]);
    format!("{table}")
}

/// Print the representative composition of a texture class.
pub fn print_texture(texture: TextureClass, composition: &SandClay) {
    println!("{}", format_texture(texture, composition));
}

use crate::cli::PreviewArgs;
use crate::error::{CliError, Result};
use eqsweep::core::design::{DesignSpace, RawMaterialMasses, REFERENCE_GANGUE_MASS_G};
use eqsweep::core::materials::MaterialLibrary;
use tracing::info;

/// Enumerates the design space and derived raw-material masses without
/// running any calculation: a dry run of the mix design table.
pub fn run(args: PreviewArgs) -> Result<()> {
    let space = DesignSpace::default();
    let points = space.enumerate()?;
    let library = MaterialLibrary::builtin();
    let silicate_water = library.silicate_water_fraction();

    println!("Design space: {} points", points.len());
    println!(
        "{:<10} {:>5} {:>5} {:>5} {:>5} {:>5} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "mix_id", "R", "f_FA", "yCO2", "w_SS", "w_b", "cement_g", "flyash_g", "water_g", "silicate_g", "total_g"
    );
    for point in points.iter().take(args.head) {
        let v = &point.variables;
        let masses =
            RawMaterialMasses::derive(v, REFERENCE_GANGUE_MASS_G, silicate_water)?;
        println!(
            "{:<10} {:>5.2} {:>5.2} {:>5.2} {:>5.2} {:>5.2} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
            point.id,
            v.binder_aggregate_ratio,
            v.fly_ash_fraction,
            v.co2_fraction,
            v.silicate_dosage,
            v.water_binder_ratio,
            masses.cement_g,
            masses.fly_ash_g,
            masses.water_g,
            masses.sodium_silicate_g,
            masses.total_g,
        );
    }
    if points.len() > args.head {
        println!("... {} more", points.len() - args.head);
    }

    if let Some(output) = args.output {
        let mut writer = csv::Writer::from_path(&output)
            .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to open {}: {e}", output.display())))?;
        writer
            .write_record([
                "mix_id",
                "R",
                "f_FA",
                "yCO2",
                "w_SS",
                "w_b",
                "cement_mass_g",
                "flyash_mass_g",
                "gangue_mass_g",
                "water_mass_g",
                "sodium_silicate_mass_g",
                "total_mass_g",
            ])
            .map_err(|e| CliError::Other(e.into()))?;
        for point in &points {
            let v = &point.variables;
            let masses =
                RawMaterialMasses::derive(v, REFERENCE_GANGUE_MASS_G, silicate_water)?;
            writer
                .write_record([
                    point.id.clone(),
                    format!("{:.6}", v.binder_aggregate_ratio),
                    format!("{:.6}", v.fly_ash_fraction),
                    format!("{:.6}", v.co2_fraction),
                    format!("{:.6}", v.silicate_dosage),
                    format!("{:.6}", v.water_binder_ratio),
                    format!("{:.6}", masses.cement_g),
                    format!("{:.6}", masses.fly_ash_g),
                    format!("{:.6}", masses.gangue_g),
                    format!("{:.6}", masses.water_g),
                    format!("{:.6}", masses.sodium_silicate_g),
                    format!("{:.6}", masses.total_g),
                ])
                .map_err(|e| CliError::Other(e.into()))?;
        }
        writer.flush().map_err(CliError::Io)?;
        info!(path = %output.display(), rows = points.len(), "Mix design table written.");
        println!("Wrote {} mix designs to {}", points.len(), output.display());
    }

    Ok(())
}

pub mod catalog;
pub mod cli;
pub mod credentials;
pub mod error;
pub mod garment;
pub mod menu;
pub mod pipeline;
pub mod presets;
pub mod remote;
pub mod settings;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::{
    catalog::Catalog,
    cli::{Action, Cli},
    credentials::{CredentialSource, Credentials, EnvFile, TOKEN_KEY, remediation},
    garment::{BodyRegion, GarmentSelection},
    menu::{App, Console, StdConsole, report_outfit, report_run},
    pipeline::Pipeline,
    presets::PRESETS,
    remote::{GradioCoarse, GradioRefine},
    settings::Settings,
};

pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    cli.apply(&mut settings);

    let env_file = EnvFile::load(&cli.env_file)?;
    match &env_file {
        Some(env) => tracing::info!("Loaded {} entries from {}", env.len(), cli.env_file.display()),
        None => tracing::info!("{} not found, using environment variables", cli.env_file.display()),
    }
    let credentials =
        Credentials::from_process(env_file.as_ref().map(|env| (cli.env_file.as_path(), env)));

    let catalog = Catalog::new(&settings.catalog_root);
    let mut console = StdConsole;
    let action = cli.command.clone().unwrap_or(Action::Menu);

    if action == Action::Check {
        return Ok(check(&catalog, &cli.env_file, &credentials, &mut console));
    }

    if let Err(e) = credentials.require_token() {
        tracing::error!("{}", e);
        eprintln!("{}", remediation(&cli.env_file));
        return Ok(ExitCode::from(1));
    }

    tracing::info!(
        "Coarse model {}{}, refinement model {}{}",
        settings.coarse.space,
        settings.coarse.api,
        settings.refine.space,
        settings.refine.api
    );
    let coarse = GradioCoarse::new(settings.coarse.clone(), &credentials, &settings.download_dir);
    let refine = GradioRefine::new(
        settings.refine.clone(),
        settings.refine_params,
        &credentials,
        &settings.download_dir,
    );
    let app = App::new(Pipeline::new(coarse, refine, &settings.results_dir), catalog);

    match action {
        Action::Run {
            person,
            garment,
            description,
            region,
        } => {
            let result = app
                .pipeline()
                .run(&person, &GarmentSelection::new(garment, description, region))
                .await;
            report_run(&mut console, &result);
            Ok(exit_code(result.is_ok()))
        }
        Action::Outfit {
            person,
            shirt,
            shirt_description,
            pants,
            pants_description,
        } => {
            let garments: Vec<GarmentSelection> = [
                (shirt, shirt_description, BodyRegion::UpperBody),
                (pants, pants_description, BodyRegion::LowerBody),
            ]
            .into_iter()
            .filter_map(|(path, description, region)| {
                let path = path?;
                let description = description.unwrap_or_else(|| stem(&path));
                Some(GarmentSelection::new(path, description, region))
            })
            .collect();

            let result = app.pipeline().run_outfit(&person, &garments).await;
            report_outfit(&mut console, &result);
            Ok(exit_code(matches!(&result, Ok(report) if report.is_success())))
        }
        _ => {
            app.run_loop(&mut console).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Reports whether the catalog and credentials are ready.
fn check(
    catalog: &Catalog,
    env_path: &Path,
    credentials: &Credentials,
    console: &mut dyn Console,
) -> ExitCode {
    console.say("Checking two-step pipeline setup");
    console.say("========================================");

    console.say(&format!("\n1. Catalog at {}:", catalog.root().display()));
    match catalog.summary() {
        Ok(summary) => {
            for (category, count) in summary {
                let mark = if count > 0 { "✓" } else { "⚠" };
                console.say(&format!("  {mark} {}: {count} image(s)", category.dir()));
            }
        }
        Err(e) => console.say(&format!("  ✗ {e}")),
    }

    let example_files: Vec<PathBuf> = PRESETS
        .iter()
        .flat_map(|p| [p.person, p.garment])
        .map(|p| catalog.root().join(p))
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    let missing: Vec<&PathBuf> = example_files.iter().filter(|p| !p.is_file()).collect();
    console.say(&format!(
        "  Example images: {}/{} present",
        example_files.len() - missing.len(),
        example_files.len()
    ));
    for path in missing {
        console.say(&format!("    ⚠ not added yet: {}", path.display()));
    }

    console.say("\n2. Credentials:");
    match credentials.source() {
        CredentialSource::File(path) => console.say(&format!("  ✓ {} loaded", path.display())),
        _ => console.say(&format!(
            "  ⚠ {} not found or has no {TOKEN_KEY} (using environment variables)",
            env_path.display()
        )),
    }

    let ready = credentials.token().is_some();
    if ready {
        console.say(&format!("  ✓ {TOKEN_KEY} found, starts with: {}", credentials.masked()));
        console.say("\nReady to run the two-step pipeline.");
    } else {
        console.say(&format!("  ✗ {TOKEN_KEY} not found"));
        console.say(&remediation(env_path));
    }

    exit_code(ready)
}

use anyhow::{Context, Result, bail};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epiflow::canvas::RecordingCanvas;
use epiflow::editor::{GraphSynchronizer, ModelCommand, ModelStore};
use epiflow::model::{Model, ModelDoc};
use epiflow::settings::Settings;
use epiflow::validate::{check_name_available, validate_model};

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and edit compartmental model files", long_about = None)]
struct Cli {
    /// Editor settings JSON file
    #[arg(long, global = true, value_name = "SETTINGS_FILE")]
    settings: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a model and print every issue found
    Check {
        #[arg(value_name = "MODEL_FILE")]
        model: Utf8PathBuf,
    },
    /// Rename a compartment, constant or intervention and print the new model
    Rename {
        #[arg(value_name = "MODEL_FILE")]
        model: Utf8PathBuf,
        old: String,
        new: String,
        /// Write the result back instead of printing it
        #[arg(long)]
        in_place: bool,
    },
    /// Print the canvas calls needed to go from one model to another
    Sync {
        #[arg(value_name = "OLD_MODEL")]
        old: Utf8PathBuf,
        #[arg(value_name = "NEW_MODEL")]
        new: Utf8PathBuf,
    },
    /// List the symbols a model defines
    Symbols {
        #[arg(value_name = "MODEL_FILE")]
        model: Utf8PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("epiflow=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = match &cli.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    match cli.command {
        Command::Check { model } => check(&model),
        Command::Rename {
            model,
            old,
            new,
            in_place,
        } => rename(&model, &old, &new, in_place, &settings),
        Command::Sync { old, new } => sync(&old, &new, &settings),
        Command::Symbols { model } => {
            let doc = ModelDoc::load(&model)?;
            for name in doc.model.symbols() {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

fn check(path: &Utf8PathBuf) -> Result<()> {
    let doc = ModelDoc::load(path)?;
    let issues = validate_model(&doc.model);
    for issue in &issues {
        println!("{}", issue);
    }
    if !issues.is_empty() {
        bail!("{}: {} issue(s)", path, issues.len());
    }
    info!(%path, "model is valid");
    Ok(())
}

fn rename(
    path: &Utf8PathBuf,
    old: &str,
    new: &str,
    in_place: bool,
    settings: &Settings,
) -> Result<()> {
    let doc = ModelDoc::load(path)?;
    let model = renamed(doc.model, old, new, settings)
        .with_context(|| format!("Failed to rename '{}' in {}", old, path))?;

    let doc = ModelDoc { model };
    if in_place {
        doc.save(path)?;
        info!(%path, old, new, "renamed symbol");
    } else {
        println!("{}", doc.to_json_string()?);
    }
    Ok(())
}

/// `model` with the symbol `old` renamed to `new` and every equation updated.
/// The new name must be valid and not taken by another symbol.
fn renamed(model: Model, old: &str, new: &str, settings: &Settings) -> Result<Model> {
    let Some((_, owner)) = model.symbol_owner(old) else {
        bail!("No symbol named '{}'", old);
    };
    if let Err(issue) = check_name_available(&model, new, Some(owner)) {
        bail!("{}", issue);
    }
    let cmd = rename_command(&model, old, new)
        .with_context(|| format!("No symbol named '{}'", old))?;

    let mut store = ModelStore::new(model, settings.history_depth);
    store.dispatch(cmd)?;
    Ok(store.model())
}

/// The update command that gives the entity currently called `old` the name
/// `new`.
fn rename_command(model: &Model, old: &str, new: &str) -> Option<ModelCommand> {
    if let Some(c) = model.compartments.iter().find(|c| c.name == old) {
        let mut c = c.clone();
        c.name = new.to_string();
        return Some(ModelCommand::UpdateCompartment(c));
    }
    if let Some(k) = model.constants.iter().find(|k| k.name == old) {
        let mut k = k.clone();
        k.name = new.to_string();
        return Some(ModelCommand::UpdateConstant(k));
    }
    model.interventions.iter().find(|i| i.name == old).map(|i| {
        let mut i = i.clone();
        i.name = new.to_string();
        ModelCommand::UpdateIntervention(i)
    })
}

fn sync(old: &Utf8PathBuf, new: &Utf8PathBuf, settings: &Settings) -> Result<()> {
    let old_model = ModelDoc::load(old)?.model;
    let new_model = ModelDoc::load(new)?.model;

    let mut sync = GraphSynchronizer::with_settings(RecordingCanvas::new(), settings);
    sync.on_model_changed(&old_model);
    sync.canvas_mut().take_calls();
    let report = sync.on_model_changed(&new_model);

    let trace = serde_json::json!({
        "calls": sync.canvas().calls(),
        "report": report,
    });
    println!("{}", serde_json::to_string_pretty(&trace)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use epiflow::model::{Compartment, Constant, Flow};

    fn sir() -> Model {
        Model {
            compartments: vec![
                Compartment::new("c1", "S", 99.0),
                Compartment::new("c2", "I", 1.0),
            ],
            constants: vec![Constant::new("k1", "beta", 0.3)],
            flows: vec![Flow::new("f1", "c1", "c2", "beta*S*I")],
            ..Default::default()
        }
    }

    #[test]
    fn test_rename_updates_equations() {
        let model = renamed(sir(), "S", "Susceptible", &Settings::default()).unwrap();
        assert_eq!(model.compartments[0].name, "Susceptible");
        assert_eq!(model.flows[0].equation, "beta*Susceptible*I");
    }

    #[test]
    fn test_rename_onto_existing_symbol_is_rejected() {
        let err = renamed(sir(), "S", "I", &Settings::default()).unwrap_err();
        assert!(err.to_string().contains("'I'"), "{}", err);
        assert!(renamed(sir(), "beta", "S", &Settings::default()).is_err());
        assert!(renamed(sir(), "S", "2x", &Settings::default()).is_err());
        assert!(renamed(sir(), "gamma", "g", &Settings::default()).is_err());
    }

    #[test]
    fn test_rename_to_same_name_is_allowed() {
        let model = renamed(sir(), "S", "S", &Settings::default()).unwrap();
        assert_eq!(model, sir());
    }
}

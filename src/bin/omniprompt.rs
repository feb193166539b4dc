use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use omniprompt::config::{ConfigStore, JsonFileConfigStore};
use omniprompt::connectivity::{AlwaysOnline, ConnectivityProbe, TcpProbe};
use omniprompt::notes::{prepare_batch, JsonNoteStore};
use omniprompt::transport::ReqwestTransport;
use omniprompt::{
  templates, BatchEvent, BatchRunner, Config, OmniClient, Provider
};

#[derive(Parser)]
#[command(name = "omniprompt")]
#[command(about = "Fill note fields with OpenAI / DeepSeek completions")]
struct Cli
{   /// Settings file (JSON mapping)
    #[arg(long, short, default_value = "config.json")]
    config: PathBuf

  , /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool

  , #[command(subcommand)]
    command: Command
}

#[derive(Subcommand)]
enum Command
{   /// Generate text for every note and write it into the output field
    Run
    {   /// Notes file: JSON array of {"id": .., "fields": {..}}
        #[arg(long)]
        notes: PathBuf

      , /// Prompt template text, overrides the configured prompt
        #[arg(long, conflicts_with = "template")]
        prompt: Option<String>

      , /// Name of a saved template
        #[arg(long)]
        template: Option<String>

      , /// Saved templates file
        #[arg(long, default_value = "prompt_templates.txt")]
        templates_file: PathBuf

      , /// Field receiving the generated text
        #[arg(long)]
        output_field: Option<String>

      , /// Skip the connectivity probe
        #[arg(long)]
        no_probe: bool
    }
  , /// Saved prompt templates
    Templates
    {   #[arg(long, default_value = "prompt_templates.txt")]
        file: PathBuf

      , #[command(subcommand)]
        action: TemplateAction
    }
  , /// Show the effective configuration (keys masked)
    ShowConfig
  , /// Write the default configuration if none exists
    InitConfig
  , /// Check outbound connectivity
    Probe
  , /// List the models offered for each provider
    Models
}

#[derive(Subcommand)]
enum TemplateAction
{   /// List template names
    List
  , /// Print one template
    Show { name: String }
  , /// Save the contents of a file under a name
    Save { name: String, from: PathBuf }
}

#[tokio::main]
async fn main() -> Result<()>
{   let cli = Cli::parse();

    let level = if cli.verbose
    {   log::LevelFilter::Debug
    } else
    {   log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
      .filter_level(level)
      .init();

    let mut store = JsonFileConfigStore::new(&cli.config);

    match cli.command
    {   Command::Run
        {   notes, prompt, template, templates_file, output_field, no_probe
        } => {
          let config = Config::load(&store)?;
          let template_text = match (prompt, template)
          {   (Some(text), _) => text
            , (None, Some(name)) => {
                let saved = templates::load(&templates_file)?;
                match saved.get(&name)
                {   Some(text) => text.clone()
                  , None => bail!("No saved template named {}", name)
                }
              }
            , (None, None) => config.prompt.clone()
          };
          let output_field = output_field
            .unwrap_or_else(|| config.selected_fields.output_field.clone());

          if no_probe
          {   run(config, AlwaysOnline, &notes, &template_text, &output_field)
                .await
          } else
          {   run(
                config, TcpProbe::default(), &notes,
                &template_text, &output_field
              ).await
          }
        }
      , Command::Templates { file, action } => {
          let mut saved = templates::load(&file)?;
          match action
          {   TemplateAction::List => {
                for name in saved.keys()
                {   println!("{}", name);
                }
              }
            , TemplateAction::Show { name } => {
                match saved.get(&name)
                {   Some(text) => println!("{}", text)
                  , None => bail!("No saved template named {}", name)
                }
              }
            , TemplateAction::Save { name, from } => {
                let text = std::fs::read_to_string(&from)
                  .with_context(|| format!("reading {}", from.display()))?;
                saved.insert(name.clone(), text.trim_end().to_string());
                templates::save(&file, &saved)?;
                println!("Prompt {} saved.", name);
              }
          }
          Ok(())
        }
      , Command::ShowConfig => {
          let config = Config::load(&store)?;
          println!("{:#?}", config);
          Ok(())
        }
      , Command::InitConfig => {
          if store.load()?.is_some()
          {   bail!("{} already exists", store.path().display());
          }
          Config::default().save(&mut store)?;
          println!("Wrote {}", store.path().display());
          Ok(())
        }
      , Command::Models => {
          let config = Config::load(&store)?;
          for provider in Provider::ALL
          {   println!("{}:", provider.label());
              for model in provider.models()
              {   let marker = if *model == config.model(provider)
                  {   "*"
                  } else
                  {   " "
                  };
                  println!("  {} {}", marker, model);
              }
          }
          Ok(())
        }
      , Command::Probe => {
          if TcpProbe::default().is_online().await
          {   println!("online");
              Ok(())
          } else
          {   bail!("No internet connection")
          }
        }
    }
}

async fn run<P>(
  config: Config
, probe: P
, notes_path: &Path
, template: &str
, output_field: &str
) -> Result<()>
where P: ConnectivityProbe + 'static
{   config.validate()?;
    let mut store = JsonNoteStore::open(notes_path)?;
    let notes = store.notes();

    let prepared = prepare_batch(&notes, template);
    for skipped in &prepared.skipped
    {   warn!("Skipping: {}", skipped);
    }
    if prepared.items.is_empty()
    {   bail!("No valid notes to process.");
    }
    info!(
      "Processing {} notes into field {}",
      prepared.items.len(), output_field
    );

    let client = Arc::new(OmniClient::with_parts(
      config, ReqwestTransport::new(), probe
    ));
    let runner = BatchRunner::new();
    let handle = runner.start(prepared.items, client)?;

    let cancel = handle.cancel_handle();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok()
      {   warn!("Interrupted, finishing the current note");
          cancel.cancel();
      }
    });

    let summary = handle.apply(&mut store, output_field, |event| {
      match event
      {   BatchEvent::Generated { note, index, text } => {
            println!("[{}] note {}: {}", index + 1, note, text);
          }
        , BatchEvent::Failed { note, index, error } => {
            println!("[{}] note {}: {}", index + 1, note, error.placeholder());
          }
        , _ => {}
      }
    }).await?;

    println!("{}", summary);
    Ok(())
}

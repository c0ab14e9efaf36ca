use std::io::Read;

use anyhow::{bail, Context};
use colored::Colorize;
use url::Url;

use fedbox_cache::{activity_purge, Cache, CacheKey};
use fedbox_filters::Filters;
use fedbox_storage::{
    bootstrap, copy_to_collection, load_item, move_to_collection, open_repository, password_store, Repository,
    StorageError, TransferReport,
};
use fedbox_vocab::{iri, Item};

use crate::cli::*;
use crate::config::Config;

/// Repository and cache for the duration of one command.
pub struct Session {
    repo: Box<dyn Repository>,
    cache: Cache,
    format: OutputFormat,
}

impl Session {
    pub fn open(config: &Config, format: OutputFormat) -> anyhow::Result<Self> {
        let repo = open_repository(&config.storage)?;
        repo.open()
            .with_context(|| format!("opening storage at {}", config.storage.path.display()))?;
        Ok(Self {
            repo,
            cache: Cache::new(&config.cache),
            format,
        })
    }

    pub fn close(self) {
        self.repo.close();
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let session = Session::open(&config, cli.format)?;
    let result = execute(&session, cli.command);
    session.close();
    result
}

fn execute(session: &Session, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Bootstrap => cmd_bootstrap(session),
        Command::Load(args) => cmd_load(session, args),
        Command::Save(args) => cmd_save(session, args),
        Command::Delete(args) => cmd_delete(session, args),
        Command::Add(args) => cmd_add(session, args),
        Command::Remove(args) => cmd_remove(session, args),
        Command::Copy(args) => cmd_transfer(session, args, false),
        Command::Move(args) => cmd_transfer(session, args, true),
        Command::Pass(args) => cmd_pass(session, args),
    }
}

fn cmd_bootstrap(session: &Session) -> anyhow::Result<()> {
    let service = bootstrap(session.repo.as_ref())?;
    match session.format {
        OutputFormat::Json => print_json(&service),
        OutputFormat::Text => {
            println!("{} Storage ready at {}", "✓".green().bold(), session.repo.base_url().as_str().bold());
            Ok(())
        }
    }
}

/// Render `iri` through the cache, the way a request handler would.
pub fn render(session: &Session, target: &str) -> anyhow::Result<Item> {
    let url = Url::parse(target).with_context(|| format!("invalid IRI {target}"))?;
    let key = CacheKey::from_request(&url, None);
    if let Some(hit) = session.cache.get(&key) {
        return Ok(hit);
    }
    let filters = Filters::from_url(&url)?;
    let page = session.repo.load(&filters)?;
    let rendered = if page.is_collection() {
        page.to_collection_page(&filters)
    } else {
        match page.items.into_iter().next() {
            Some(item) => item,
            None => return Err(StorageError::not_found(target).into()),
        }
    };
    session.cache.set(key, rendered.clone());
    Ok(rendered)
}

fn cmd_load(session: &Session, args: LoadArgs) -> anyhow::Result<()> {
    let rendered = render(session, &args.iri)?;
    if session.format == OutputFormat::Json {
        return print_json(&rendered);
    }
    if rendered.kind() == Some("OrderedCollectionPage") {
        let total = rendered.get("totalItems").and_then(|v| v.as_u64()).unwrap_or_default();
        println!("{} ({} items)", args.iri.bold(), total);
        for member in rendered.items("orderedItems") {
            print_line(&member);
        }
        Ok(())
    } else {
        print_json(&rendered)
    }
}

fn cmd_save(session: &Session, args: SaveArgs) -> anyhow::Result<()> {
    let data = if args.file == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf).context("reading stdin")?;
        buf
    } else {
        std::fs::read(&args.file).with_context(|| format!("reading {}", args.file))?
    };
    let mut item = Item::from_slice(&data).context("decoding document")?;
    if item.id().is_none() {
        let id = session.repo.generate_id(&item, None)?;
        item.set_id(&id);
    }
    let saved = session.repo.save(item)?;
    if saved.is_activity() {
        activity_purge(&session.cache, &saved, None);
    } else if let Some(id) = saved.id() {
        forget(session, id);
    }
    match session.format {
        OutputFormat::Json => print_json(&saved),
        OutputFormat::Text => {
            println!("{} Saved {}", "✓".green().bold(), describe(&saved));
            Ok(())
        }
    }
}

fn cmd_delete(session: &Session, args: IriArgs) -> anyhow::Result<()> {
    let item = load_item(session.repo.as_ref(), &args.iri)?;
    let tomb = session.repo.delete(&item)?;
    forget(session, &args.iri);
    match session.format {
        OutputFormat::Json => print_json(&tomb),
        OutputFormat::Text => {
            println!("{} Deleted {}", "✓".green().bold(), args.iri.yellow());
            Ok(())
        }
    }
}

fn cmd_add(session: &Session, args: AddArgs) -> anyhow::Result<()> {
    session.repo.add_to_collection(&args.to, &Item::link(args.iri.clone()))?;
    session.cache.remove(&[args.to.as_str()]);
    println!("{} Added {} to {}", "✓".green().bold(), args.iri.yellow(), args.to.bold());
    Ok(())
}

fn cmd_remove(session: &Session, args: RemoveArgs) -> anyhow::Result<()> {
    session.repo.remove_from_collection(&args.from, &Item::link(args.iri.clone()))?;
    session.cache.remove(&[args.from.as_str()]);
    println!("{} Removed {} from {}", "✓".green().bold(), args.iri.yellow(), args.from.bold());
    Ok(())
}

fn cmd_transfer(session: &Session, args: TransferArgs, moving: bool) -> anyhow::Result<()> {
    let report = if moving {
        move_to_collection(session.repo.as_ref(), &args.to, &args.sources)?
    } else {
        copy_to_collection(session.repo.as_ref(), &args.to, &args.sources)?
    };
    session.cache.remove(&[args.to.as_str()]);
    print_report(session, &report, if moving { "Moved" } else { "Copied" }, &args.to)
}

fn cmd_pass(session: &Session, args: PassArgs) -> anyhow::Result<()> {
    let store = password_store(session.repo.as_ref())?;
    match args.action {
        PassAction::Set { iri, password } => {
            store.password_set(&iri, password.as_bytes())?;
            println!("{} Password set for {}", "✓".green().bold(), iri.yellow());
        }
        PassAction::Check { iri, password } => match store.password_check(&iri, password.as_bytes()) {
            Ok(()) => println!("{} Password matches for {}", "✓".green().bold(), iri.yellow()),
            Err(e) if e.is_unauthorized() => bail!("password does not match for {iri}"),
            Err(e) => return Err(e.into()),
        },
    }
    Ok(())
}

/// Drop cached renderings of `target` and its container.
fn forget(session: &Session, target: &str) {
    let parent = iri::parent(target);
    let mut iris = vec![target];
    iris.extend(parent.as_deref());
    session.cache.remove(&iris);
}

fn print_report(session: &Session, report: &TransferReport, verb: &str, destination: &str) -> anyhow::Result<()> {
    if session.format == OutputFormat::Json {
        let failed: Vec<_> = report
            .failed
            .iter()
            .map(|(iri, reason)| serde_json::json!({ "iri": iri, "error": reason }))
            .collect();
        let out = serde_json::json!({ "transferred": report.transferred, "failed": failed });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    println!(
        "{} {} {} item(s) to {}",
        "✓".green().bold(),
        verb,
        report.transferred.len(),
        destination.bold()
    );
    for (iri, reason) in &report.failed {
        println!("  {} {} {}", "✗".red(), iri.yellow(), reason.dimmed());
    }
    Ok(())
}

fn print_json(item: &Item) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(item.as_value())?);
    Ok(())
}

fn print_line(item: &Item) {
    if item.is_tombstone() {
        println!("  {}", describe(item).dimmed());
    } else {
        println!("  {}", describe(item));
    }
}

fn describe(item: &Item) -> String {
    match (item.kind(), item.id()) {
        (Some(kind), Some(id)) => format!("{} {}", kind.cyan(), id),
        (None, Some(id)) => id.to_string(),
        (Some(kind), None) => kind.cyan().to_string(),
        (None, None) => "<anonymous>".into(),
    }
}

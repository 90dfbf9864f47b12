use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::{anyhow, Context, Result};
use filer::config::{config_file_path, load_or_default};
use filer::logging::init_logging;
use filer::{FileCategory, FileStore, Outcome, ResultContext, ResultPump, SaveRequest};

fn main() -> Result<()> {
    let command = Command::parse(env::args().skip(1))?;
    let config = load_or_default()?;
    init_logging(&config.logging)?;

    let (results, pump) = ResultContext::pumped();
    let store = FileStore::builder(config).results(results).build()?;

    match command {
        Command::Dirs => {
            for category in FileCategory::ALL {
                let dir = store.resolve_directory(category)?;
                println!("{:<10} {}", category.label(), dir.display());
            }
            println!("config     {}", config_file_path()?.display());
        }
        Command::Save {
            category,
            file,
            name,
            overwrite,
        } => {
            let data = fs::read(&file).with_context(|| format!("Failed to read {:?}", file))?;
            let mut request = SaveRequest::new(data, &category).overwrite(overwrite);
            if let Some(name) = name {
                request = request.named(name);
            }
            let path = wait_for(&pump, |done| store.save(request, done))?;
            println!("{}", path.display());
        }
        Command::Move { file, category } => {
            let file = absolute(file)?;
            let path = wait_for(&pump, |done| store.move_file(&file, category, done))?;
            println!("{}", path.display());
        }
        Command::Remove { path } => {
            let path = absolute(path)?;
            let removed = wait_for(&pump, |done| store.delete(&path, done))?;
            println!("removed {}", removed.display());
        }
        Command::Purge { category } => {
            let removed = wait_for(&pump, |done| {
                store.delete_category(category, done);
                Ok(())
            })?;
            println!("purged {}", removed.display());
        }
        Command::List { category } => {
            let files = wait_for(&pump, |done| {
                store.list(category, done);
                Ok(())
            })?;
            for file in files {
                println!("{}", file.display());
            }
        }
    }

    Ok(())
}

/// Starts one operation and runs the pump on this thread until its
/// completion has been delivered.
fn wait_for<T, S>(pump: &ResultPump, start: S) -> Result<T>
where
    T: Send + 'static,
    S: FnOnce(Box<dyn FnOnce(Outcome<T>) + Send>) -> Result<(), filer::StoreError>,
{
    let (tx, rx) = mpsc::channel();
    start(Box::new(move |outcome| {
        let _ = tx.send(outcome);
    }))?;
    loop {
        if let Ok(outcome) = rx.try_recv() {
            return outcome.map_err(Into::into);
        }
        if !pump.run_one() {
            return Err(anyhow!("Result context closed before the operation finished"));
        }
    }
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    Ok(env::current_dir()
        .context("Unable to determine the current directory")?
        .join(path))
}

enum Command {
    Dirs,
    Save {
        category: FileCategory,
        file: PathBuf,
        name: Option<String>,
        overwrite: bool,
    },
    Move {
        file: PathBuf,
        category: FileCategory,
    },
    Remove {
        path: PathBuf,
    },
    Purge {
        category: FileCategory,
    },
    List {
        category: FileCategory,
    },
}

impl Command {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let Some(verb) = args.next() else {
            print_usage();
            std::process::exit(2);
        };
        let command = match verb.as_str() {
            "dirs" => Command::Dirs,
            "save" => {
                let category = parse_category(args.next())?;
                let file = args
                    .next()
                    .map(PathBuf::from)
                    .context("Expected a file to save")?;
                let mut name = None;
                let mut overwrite = false;
                while let Some(arg) = args.next() {
                    match arg.as_str() {
                        "--name" => {
                            name = Some(args.next().context("Expected a file name after --name")?);
                        }
                        "--overwrite" => overwrite = true,
                        other => return Err(unknown(other)),
                    }
                }
                Command::Save {
                    category,
                    file,
                    name,
                    overwrite,
                }
            }
            "move" | "mv" => {
                let file = args
                    .next()
                    .map(PathBuf::from)
                    .context("Expected a file to move")?;
                let category = parse_category(args.next())?;
                Command::Move { file, category }
            }
            "rm" => Command::Remove {
                path: args
                    .next()
                    .map(PathBuf::from)
                    .context("Expected a path to remove")?,
            },
            "purge" => Command::Purge {
                category: parse_category(args.next())?,
            },
            "ls" => Command::List {
                category: parse_category(args.next())?,
            },
            "--help" | "-h" | "help" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(unknown(other)),
        };
        if let Some(extra) = args.next() {
            return Err(unknown(&extra));
        }
        Ok(command)
    }
}

fn parse_category(arg: Option<String>) -> Result<FileCategory> {
    let arg = arg.context("Expected a category (thumbnail, image, audio, video, database, temp)")?;
    Ok(arg.parse()?)
}

fn unknown(arg: &str) -> anyhow::Error {
    anyhow!("Unknown argument '{arg}'. Run with --help for usage instructions.")
}

fn print_usage() {
    println!("filer: categorized file storage");
    println!("Usage: filer <command> [arguments]");
    println!("Commands:");
    println!("  dirs                                      Create and print every category directory");
    println!("  save <category> <file> [--name N] [--overwrite]");
    println!("                                            Store a copy of <file> in <category>");
    println!("  move <file> <category>                    Move <file> into <category>");
    println!("  rm <path>                                 Delete a stored file");
    println!("  purge <category>                          Delete a whole category");
    println!("  ls <category>                             List the files in a category");
    println!("Environment:");
    println!("  FILER_HOME     Keep every category under this directory");
    println!("  FILER_CONFIG   Use this config file");
}

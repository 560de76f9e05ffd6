// projdex - keeps track of every project scattered across your disk
//
// This is the main entry point. Parses CLI args and dispatches to handlers.

use projdex_lib::{
    core::{CancelFlag, ReconciliationEngine, ScanOptions},
    db::models::{CommandSpec, ProjectPatch, ProjectQuery, ProjectStatus},
    Database, ProjdexError, Result,
};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Grab whatever the user typed
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let command = &args[1];

    let result = match command.as_str() {
        "refresh" => handle_refresh(&args[2..]).await,
        "list" => handle_list(&args[2..]).await,
        "show" => handle_show(&args[2..]).await,
        "status" => handle_status(&args[2..]).await,
        "fav" => handle_fav(&args[2..]).await,
        "rename" => handle_rename(&args[2..]).await,
        "cmd" => handle_cmd(&args[2..]).await,
        "roots" => handle_roots(&args[2..]).await,
        "forget" => handle_forget(&args[2..]).await,
        "stats" => handle_stats().await,
        "version" | "-v" | "--version" => {
            println!("projdex v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "-h" | "--help" => {
            print_usage();
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }

    Ok(())
}

// Open the shared store under the user's home directory
async fn get_database() -> Result<Database> {
    let home = dirs::home_dir()
        .ok_or_else(|| ProjdexError::Config("cannot locate home directory".to_string()))?;

    let db = Database::new(home.join(".projdex").join("projects.db")).await?;

    if db.recovered_from_corruption() {
        eprintln!(
            "Warning: the project store was corrupt and has been reset. \
             The old file was kept next to it with a .corrupt suffix."
        );
    }

    Ok(db)
}

// Store keys are realpaths, so user-typed paths get the same treatment
fn resolve_path(raw: &str) -> String {
    std::fs::canonicalize(raw)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| raw.to_string())
}

async fn handle_refresh(args: &[String]) -> Result<()> {
    let db = Arc::new(get_database().await?);

    // Roots on the command line win; otherwise use the configured ones
    let roots: Vec<PathBuf> = if args.is_empty() {
        db.scan_roots().await?
    } else {
        args.iter().map(PathBuf::from).collect()
    };

    if roots.is_empty() {
        eprintln!("No scan roots configured. Add one with: projdex roots add <dir>");
        return Ok(());
    }

    let engine = ReconciliationEngine::new(Arc::clone(&db), ScanOptions::default());

    // Ctrl-C aborts the scan before anything is written
    let cancel = CancelFlag::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    match engine.reconcile(roots, cancel).await {
        Ok(outcome) => {
            for warning in &outcome.warnings {
                eprintln!("warning: {}", warning);
            }

            let present = outcome.projects.iter().filter(|p| p.present).count();
            let missing = outcome.projects.len() - present;
            println!(
                "Found {} projects ({} tracked, {} missing).",
                outcome.discovered,
                outcome.projects.len(),
                missing
            );
            Ok(())
        }
        Err(ProjdexError::ScanCancelled) => {
            eprintln!("Scan cancelled, nothing was written.");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn handle_list(args: &[String]) -> Result<()> {
    let mut filter = ProjectQuery::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--status" => {
                i += 1;
                if i < args.len() {
                    filter.status = Some(ProjectStatus::from_str(&args[i])?);
                }
            }
            "--lang" => {
                i += 1;
                if i < args.len() {
                    filter.language = Some(args[i].clone());
                }
            }
            "--search" => {
                i += 1;
                if i < args.len() {
                    filter.text = Some(args[i].clone());
                }
            }
            "--fav" => filter.favorites_only = true,
            "--all" => filter.include_absent = true,
            arg => {
                eprintln!("Unknown flag: {}", arg);
                return Ok(());
            }
        }
        i += 1;
    }

    let db = get_database().await?;
    let projects = db.query(&filter).await?;

    if projects.is_empty() {
        println!("No projects match. Run 'projdex refresh' first?");
        return Ok(());
    }

    for project in &projects {
        let star = if project.favorite { "*" } else { " " };
        let gone = if project.present { "" } else { " (missing)" };
        let language = project
            .primary_language()
            .unwrap_or_else(|| "unknown".to_string());

        println!(
            "{} {:<24} {:<12} {:<10} {}{}",
            star,
            project.name,
            language,
            project.status().label(),
            project.path,
            gone
        );
    }

    Ok(())
}

async fn handle_show(args: &[String]) -> Result<()> {
    let Some(raw) = args.first() else {
        eprintln!("Usage: projdex show <path>");
        return Ok(());
    };

    let db = get_database().await?;
    let path = resolve_path(raw);

    let Some(project) = db.get_project(&path).await? else {
        return Err(ProjdexError::UnknownProject(path));
    };

    println!("{}", project.name);
    println!("  path:       {}", project.path);
    println!("  status:     {}", project.status().label());
    println!("  favorite:   {}", if project.favorite { "yes" } else { "no" });
    println!("  present:    {}", if project.present { "yes" } else { "no" });

    let shares = project.language_shares();
    if shares.is_empty() {
        println!("  languages:  unknown");
    } else {
        let rendered: Vec<String> = shares
            .iter()
            .map(|s| format!("{} {:.0}%", s.tag, s.weight * 100.0))
            .collect();
        println!("  languages:  {}", rendered.join(", "));
    }

    if let Some(branch) = &project.git_branch {
        println!("  branch:     {}", branch);
    }
    if let Some(modified) = &project.last_modified {
        println!("  modified:   {}", modified);
    }
    println!("  first seen: {}", project.first_seen);
    if !project.notes.is_empty() {
        println!("  notes:      {}", project.notes);
    }

    let commands = db.list_custom_commands(&path).await?;
    if !commands.is_empty() {
        println!("  commands:");
        for command in commands {
            println!("    {:<12} {}", command.name, command.command_template);
        }
    }

    Ok(())
}

async fn handle_status(args: &[String]) -> Result<()> {
    if args.len() < 2 {
        eprintln!("Usage: projdex status <active|hold|archived> <path>...");
        return Ok(());
    }

    let status = ProjectStatus::from_str(&args[0])?;
    let paths: Vec<String> = args[1..].iter().map(|raw| resolve_path(raw)).collect();

    let db = get_database().await?;
    // All listed paths flip together, or none do
    db.batch_update_status(&paths, status).await?;

    println!("Marked {} project(s) {}.", paths.len(), status.label());
    Ok(())
}

async fn handle_fav(args: &[String]) -> Result<()> {
    let Some(raw) = args.first() else {
        eprintln!("Usage: projdex fav <path>");
        return Ok(());
    };

    let db = get_database().await?;
    let path = resolve_path(raw);

    let Some(project) = db.get_project(&path).await? else {
        return Err(ProjdexError::UnknownProject(path));
    };

    let now_favorite = !project.favorite;
    db.update_user_fields(
        &path,
        &ProjectPatch {
            favorite: Some(now_favorite),
            ..ProjectPatch::default()
        },
    )
    .await?;

    if now_favorite {
        println!("{} is now a favorite.", project.name);
    } else {
        println!("{} is no longer a favorite.", project.name);
    }
    Ok(())
}

async fn handle_rename(args: &[String]) -> Result<()> {
    if args.len() < 2 {
        eprintln!("Usage: projdex rename <path> <new name>");
        return Ok(());
    }

    let db = get_database().await?;
    let path = resolve_path(&args[0]);
    let name = args[1..].join(" ");

    db.update_user_fields(
        &path,
        &ProjectPatch {
            name: Some(name.clone()),
            ..ProjectPatch::default()
        },
    )
    .await?;

    println!("Renamed to '{}'.", name);
    Ok(())
}

async fn handle_cmd(args: &[String]) -> Result<()> {
    let usage = || {
        eprintln!("Usage: projdex cmd add <path> <name> <template>");
        eprintln!("       projdex cmd rm <path> <name>");
        eprintln!("       projdex cmd list <path>");
        eprintln!("Templates may use {{path}} and {{name}} placeholders.");
    };

    let Some(action) = args.first() else {
        usage();
        return Ok(());
    };

    let db = get_database().await?;

    match action.as_str() {
        "add" if args.len() >= 4 => {
            let path = resolve_path(&args[1]);
            let name = args[2].clone();
            let template = args[3..].join(" ");

            let mut commands: Vec<CommandSpec> = db
                .list_custom_commands(&path)
                .await?
                .into_iter()
                .map(|c| CommandSpec {
                    name: c.name,
                    command_template: c.command_template,
                })
                .collect();

            // Same name again just replaces the template
            if let Some(existing) = commands.iter_mut().find(|c| c.name == name) {
                existing.command_template = template;
            } else {
                commands.push(CommandSpec {
                    name: name.clone(),
                    command_template: template,
                });
            }

            db.update_user_fields(
                &path,
                &ProjectPatch {
                    commands: Some(commands),
                    ..ProjectPatch::default()
                },
            )
            .await?;

            println!("Saved command '{}'.", name);
        }
        "rm" if args.len() >= 3 => {
            let path = resolve_path(&args[1]);
            let name = &args[2];

            let commands: Vec<CommandSpec> = db
                .list_custom_commands(&path)
                .await?
                .into_iter()
                .filter(|c| &c.name != name)
                .map(|c| CommandSpec {
                    name: c.name,
                    command_template: c.command_template,
                })
                .collect();

            db.update_user_fields(
                &path,
                &ProjectPatch {
                    commands: Some(commands),
                    ..ProjectPatch::default()
                },
            )
            .await?;

            println!("Removed command '{}'.", name);
        }
        "list" if args.len() >= 2 => {
            let path = resolve_path(&args[1]);
            let commands = db.list_custom_commands(&path).await?;

            if commands.is_empty() {
                println!("No commands stored for this project.");
            }
            for command in commands {
                println!("{:<12} {}", command.name, command.command_template);
            }
        }
        _ => usage(),
    }

    Ok(())
}

async fn handle_roots(args: &[String]) -> Result<()> {
    let Some(action) = args.first() else {
        eprintln!("Usage: projdex roots <add|rm|list> [dir]");
        return Ok(());
    };

    let db = get_database().await?;
    let mut roots = db.scan_roots().await?;

    match action.as_str() {
        "add" if args.len() >= 2 => {
            for raw in &args[1..] {
                let root = PathBuf::from(resolve_path(raw));
                if !roots.contains(&root) {
                    roots.push(root);
                }
            }
            db.set_scan_roots(&roots).await?;
            println!("Now scanning {} root(s).", roots.len());
        }
        "rm" if args.len() >= 2 => {
            let target = PathBuf::from(resolve_path(&args[1]));
            roots.retain(|root| root != &target);
            db.set_scan_roots(&roots).await?;
            println!("Now scanning {} root(s).", roots.len());
        }
        "list" => {
            if roots.is_empty() {
                println!("No scan roots configured.");
            }
            for root in roots {
                println!("{}", root.display());
            }
        }
        _ => eprintln!("Usage: projdex roots <add|rm|list> [dir]"),
    }

    Ok(())
}

async fn handle_forget(args: &[String]) -> Result<()> {
    let Some(raw) = args.first() else {
        eprintln!("Usage: projdex forget <path>");
        return Ok(());
    };

    let db = get_database().await?;
    let path = resolve_path(raw);

    if db.delete_project(&path).await? {
        println!("Forgot {}.", path);
    } else {
        println!("Nothing stored for {}.", path);
    }

    Ok(())
}

async fn handle_stats() -> Result<()> {
    let db = get_database().await?;
    let stats = db.stats().await?;

    println!("Store: {}", db.path().display());
    println!("  projects: {} ({} present)", stats.total_projects, stats.present_projects);
    println!("  commands: {}", stats.total_commands);

    Ok(())
}

fn print_usage() {
    println!("projdex - remembers where all your projects live");
    println!();
    println!("Usage:");
    println!("  projdex refresh [dir...]          scan the roots and sync the store");
    println!("  projdex list [flags]              show tracked projects");
    println!("      --status <active|hold|archived>");
    println!("      --lang <tag>  --fav  --search <text>  --all");
    println!("  projdex show <path>               full details for one project");
    println!("  projdex status <s> <path>...      set status on one or more projects");
    println!("  projdex fav <path>                toggle favorite");
    println!("  projdex rename <path> <name>      set a display name");
    println!("  projdex cmd add|rm|list ...       manage per-project command templates");
    println!("  projdex roots add|rm|list [dir]   manage scan roots");
    println!("  projdex forget <path>             drop a project from the store");
    println!("  projdex stats                     store statistics");
    println!("  projdex version                   print version");
}

use crate::App;
use docsearch_core::DocumentFormat;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

pub async fn run(app: &App) -> anyhow::Result<()> {
    println!("\n{}", "=".repeat(50));
    println!("DOCUMENT SEARCH");
    println!("{}", "=".repeat(50));

    loop {
        println!("\nMAIN MENU");
        println!("1. Add document");
        println!("2. Search documents");
        println!("3. Manage database");
        println!("4. Exit");

        let Some(choice) = choose(4, "Choose an option")? else {
            break;
        };

        match choice {
            1 => add_document(app).await?,
            2 => search_documents(app).await?,
            3 => manage_database(app)?,
            _ => break,
        }
    }

    println!("Goodbye!");
    Ok(())
}

pub fn confirm(message: &str) -> io::Result<bool> {
    Ok(prompt(message)?.is_some_and(|answer| answer.eq_ignore_ascii_case("yes")))
}

/// `None` once stdin is closed.
fn prompt(message: &str) -> io::Result<Option<String>> {
    print!("{message}: ");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn choose(max: usize, message: &str) -> io::Result<Option<usize>> {
    loop {
        let Some(answer) = prompt(&format!("{message} (1-{max})"))? else {
            return Ok(None);
        };
        if answer.is_empty() {
            continue;
        }
        match answer.parse::<usize>() {
            Ok(choice) if (1..=max).contains(&choice) => return Ok(Some(choice)),
            _ => println!("Please enter a number between 1 and {max}"),
        }
    }
}

enum BrowseEntry {
    Folder(PathBuf),
    Document(PathBuf),
}

/// Visible subfolders and PDF/DOCX files of `directory`, each sorted by name.
fn directory_listing(directory: &Path) -> io::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut folders = Vec::new();
    let mut documents = Vec::new();

    let paths = std::fs::read_dir(directory)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()));
    for path in paths {
        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.'));
        if hidden {
            continue;
        }
        if path.is_dir() {
            folders.push(path);
        } else if path.is_file() && DocumentFormat::from_path(&path).is_some() {
            documents.push(path);
        }
    }

    folders.sort();
    documents.sort();
    Ok((folders, documents))
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Walks folders starting at `start` until a document is picked. Returned
/// paths are absolute.
fn browse(start: &Path) -> io::Result<Option<PathBuf>> {
    let mut directory = start.canonicalize()?;

    loop {
        let mut entries = Vec::new();
        if let Some(parent) = directory.parent() {
            entries.push(("..".to_string(), BrowseEntry::Folder(parent.to_path_buf())));
        }

        let (folders, documents) = directory_listing(&directory)?;
        for folder in folders {
            entries.push((format!("{}/", entry_name(&folder)), BrowseEntry::Folder(folder)));
        }
        for document in documents {
            entries.push((entry_name(&document), BrowseEntry::Document(document)));
        }

        println!("\n{}", directory.display());
        for (position, (label, _)) in entries.iter().enumerate() {
            println!("  {}. {label}", position + 1);
        }
        let back = entries.len() + 1;
        println!("  {back}. Back");

        let Some(choice) = choose(back, "Choose an entry")? else {
            return Ok(None);
        };
        if choice == back {
            return Ok(None);
        }

        match entries.into_iter().nth(choice - 1) {
            Some((_, BrowseEntry::Folder(folder))) => directory = folder,
            Some((_, BrowseEntry::Document(document))) => return Ok(Some(document)),
            None => return Ok(None),
        }
    }
}

async fn add_document(app: &App) -> anyhow::Result<()> {
    println!("\nADD DOCUMENT");
    println!("1. Browse for a file");
    println!("2. Enter file path");
    println!("3. Index a folder");
    println!("4. Back");

    let Some(choice) = choose(4, "Choose an option")? else {
        return Ok(());
    };

    let target = match choice {
        1 => match browse(Path::new("."))? {
            Some(document) => document,
            None => return Ok(()),
        },
        2 | 3 => {
            let label = if choice == 2 { "File path" } else { "Folder path" };
            match prompt(label)? {
                Some(path) if !path.is_empty() => PathBuf::from(path),
                _ => return Ok(()),
            }
        }
        _ => return Ok(()),
    };

    if choice == 3 && !target.is_dir() {
        println!("'{}' is not a folder.", target.display());
        return Ok(());
    }

    if let Err(error) = app.index_path(&target).await {
        app.report(&error);
    }
    Ok(())
}

async fn search_documents(app: &App) -> anyhow::Result<()> {
    let Some(query) = prompt("\nEnter your search query")? else {
        return Ok(());
    };
    if query.is_empty() {
        println!("Please enter a query.");
        return Ok(());
    }

    if let Err(error) = app.search(&query, app.default_top_k()).await {
        app.report(&error);
    }
    Ok(())
}

fn manage_database(app: &App) -> anyhow::Result<()> {
    println!("\nMANAGE DATABASE");
    println!("1. List indexed documents");
    println!("2. Delete a document");
    println!("3. Clear the database");
    println!("4. Back");

    let Some(choice) = choose(4, "Choose an option")? else {
        return Ok(());
    };

    let outcome = match choice {
        1 => app.list_files().map(|_| ()),
        2 => match app.list_files() {
            Ok(files) if !files.is_empty() => match choose(files.len(), "Document to delete")? {
                Some(index) => app.delete_file(&files[index - 1].file_identifier),
                None => Ok(()),
            },
            Ok(_) => Ok(()),
            Err(error) => Err(error),
        },
        3 => {
            if confirm("Delete ALL indexed documents? Type 'yes' to confirm")? {
                app.clear()
            } else {
                println!("Cancelled.");
                Ok(())
            }
        }
        _ => Ok(()),
    };

    if let Err(error) = outcome {
        app.report(&error);
    }
    Ok(())
}

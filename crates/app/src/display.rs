use docsearch_core::{FileSummary, FolderReport, IndexStage, SearchHit};
use std::fmt::Write;

pub fn print_stage(stage: IndexStage) {
    match stage {
        IndexStage::Done | IndexStage::Failed => {}
        _ => println!("  {stage}..."),
    }
}

pub fn format_results(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found for your search.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "Search Results ({} results):", hits.len());
    let _ = writeln!(out, "{}\n", "=".repeat(50));

    for (position, hit) in hits.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. Source: {} | Similarity: {:.1}%",
            position + 1,
            hit.file_identifier,
            hit.score * 100.0
        );
        let _ = writeln!(out, "{}\n", hit.chunk_text);
        let _ = writeln!(out, "{}\n", "-".repeat(30));
    }

    out
}

pub fn print_files(files: &[FileSummary]) {
    if files.is_empty() {
        println!("The database is empty.");
        return;
    }

    println!("Indexed documents ({}):", files.len());
    for (position, file) in files.iter().enumerate() {
        println!(
            "  {}. {} ({} chunks)",
            position + 1,
            file.file_identifier,
            file.chunk_count
        );
    }
}

pub fn print_folder_report(report: &FolderReport) {
    for document in &report.indexed {
        println!(
            "  indexed {} ({} chunks)",
            document.file_identifier, document.chunk_count
        );
    }
    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    println!(
        "{} indexed, {} skipped.",
        report.indexed.len(),
        report.skipped.len()
    );
}

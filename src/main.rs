use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use console::{Term, style};
use pagewright::{AssembleOptions, AssemblyPlan, DocId, PageUid, Session};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pagewright")]
#[command(
    about = "Assemble a PDF from pages of other PDFs",
    version,
    long_about = "Pick pages out of one or more PDFs, drop, rotate or reorder them, and write a single merged file.\n\
                  \n\
                  Pages are addressed as FILE:PAGES, where FILE is the 1-based input number and\n\
                  PAGES a list like 1,3,5-10 or 4-. With a single input the FILE: prefix is optional.\n\
                  \n\
                  Examples:\n\
                  • Quick info:  pagewright a.pdf b.pdf\n\
                  • Merge:       pagewright assemble a.pdf b.pdf -o out.pdf\n\
                  • Edit:        pagewright assemble a.pdf b.pdf -d 1:2 --rotate 2:1-3=90"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(global = true)]
    files: Vec<PathBuf>,

    #[arg(short, long, global = true)]
    recursive: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        visible_aliases = ["merge", "a"],
        after_help = "Examples:\n  pagewright assemble a.pdf b.pdf -o out.pdf\n  pagewright a scan.pdf -d 2,4 --rotate 3=180\n  pagewright a a.pdf b.pdf --order 2:1 --order 1:1-3"
    )]
    Assemble {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long, default_value = "merged.pdf")]
        output: PathBuf,

        /// Pages to leave out, as FILE:PAGES
        #[arg(short, long = "delete", value_name = "FILE:PAGES", value_parser = parse_selector)]
        deletes: Vec<PageSelector>,

        /// Pages to turn clockwise, as FILE:PAGES=DEGREES
        #[arg(long = "rotate", value_name = "FILE:PAGES=DEGREES", value_parser = parse_rotation)]
        rotations: Vec<(PageSelector, i64)>,

        /// Full output order, as repeated FILE:PAGES groups
        #[arg(long = "order", value_name = "FILE:PAGES", value_parser = parse_selector)]
        order: Vec<PageSelector>,

        /// Overwrite the output without asking
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Clone, Debug)]
struct PageSelector {
    file: Option<usize>,
    pages: String,
}

fn parse_selector(raw: &str) -> std::result::Result<PageSelector, String> {
    match raw.split_once(':') {
        Some((file, pages)) => {
            let file = file
                .trim()
                .parse::<usize>()
                .map_err(|_| format!("invalid input number in '{}'", raw))?;
            if file == 0 {
                return Err(format!("input numbers start at 1 in '{}'", raw));
            }
            Ok(PageSelector {
                file: Some(file - 1),
                pages: pages.to_string(),
            })
        }
        None => Ok(PageSelector {
            file: None,
            pages: raw.to_string(),
        }),
    }
}

fn parse_rotation(raw: &str) -> std::result::Result<(PageSelector, i64), String> {
    let (selector, degrees) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected FILE:PAGES=DEGREES, got '{}'", raw))?;
    let degrees = degrees
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("invalid angle in '{}'", raw))?;
    Ok((parse_selector(selector)?, degrees))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        None => {
            if cli.files.is_empty() {
                bail!(
                    "No PDF files or command specified. Try 'pagewright --help' or 'pagewright <file.pdf>' for quick info"
                );
            }
            let files = expand_inputs(&cli.files, cli.recursive)?;
            show_info(&files)
        }
        Some(Commands::Assemble {
            inputs,
            output,
            deletes,
            rotations,
            order,
            yes,
        }) => {
            let inputs = expand_inputs(&inputs, cli.recursive)?;
            let edits = Edits {
                deletes,
                rotations,
                order,
            };
            assemble_pdfs(&inputs, &edits, &output, yes)
        }
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Check every input path, descending into directories with `recursive`.
fn expand_inputs(paths: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut visited = HashSet::new();
    for path in paths {
        if path.is_dir() {
            if !recursive {
                bail!(
                    "'{}' is a directory. Use -r/--recursive to search subdirectories",
                    path.display()
                );
            }
            let mut found = Vec::new();
            collect_pdfs(path, &mut found, &mut visited);
            found.sort();
            files.extend(found);
        } else if path.is_file() {
            if !is_pdf(path) {
                bail!("Non-PDF file provided: {}", path.display());
            }
            files.push(path.clone());
        } else {
            bail!("Invalid path: {}", path.display());
        }
    }
    if files.is_empty() {
        bail!("No PDF files found");
    }
    Ok(files)
}

fn collect_pdfs(dir: &Path, found: &mut Vec<PathBuf>, visited: &mut HashSet<PathBuf>) {
    let key = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    if !visited.insert(key) {
        return;
    }
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("cannot read directory {}: {}", dir.display(), e);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_pdfs(&path, found, visited);
        } else if path.is_file() && is_pdf(&path) {
            found.push(path);
        }
    }
}

fn show_info(files: &[PathBuf]) -> Result<()> {
    let mut session = Session::new();
    let mut total_pages = 0;

    for file in files {
        match session.load_path(file) {
            Ok(doc_id) => total_pages += print_document(&session, file, doc_id)?,
            Err(e) => eprintln!("{} {}: {}", style("✗").red(), file.display(), e),
        }
        if files.len() > 1 {
            println!();
        }
    }

    if files.len() > 1 {
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("Total: {} PDF(s), {} page(s)", files.len(), total_pages);
    }
    Ok(())
}

fn print_document(session: &Session, path: &Path, doc_id: DocId) -> Result<usize> {
    const LISTED_PAGES: usize = 10;

    let document = session.document(doc_id)?;
    let page_count = document.page_count();
    println!("📄 {}", style(path.display()).bold());
    println!("   Pages: {}", page_count);
    println!("   Version: {}", document.version());

    for index in 0..page_count.min(LISTED_PAGES) {
        let geometry = document.page_geometry(index)?;
        let (width, height) = geometry.media_box.displayed_size(geometry.rotation);
        println!(
            "   {:>4}  {:.0} x {:.0} pt  {}",
            index + 1,
            width,
            height,
            style(geometry.rotation).dim()
        );
    }
    if page_count > LISTED_PAGES {
        println!("   ... {} more", page_count - LISTED_PAGES);
    }
    Ok(page_count)
}

struct Edits {
    deletes: Vec<PageSelector>,
    rotations: Vec<(PageSelector, i64)>,
    order: Vec<PageSelector>,
}

/// Page uids of each input, indexed by input then 0-based page.
struct InputPages(Vec<Vec<PageUid>>);

impl InputPages {
    fn resolve(&self, selector: &PageSelector) -> Result<(usize, Vec<PageUid>)> {
        let file = match selector.file {
            Some(file) => file,
            None if self.0.len() == 1 => 0,
            None => bail!(
                "'{}' needs an input number (FILE:PAGES) when there are several inputs",
                selector.pages
            ),
        };
        let Some(uids) = self.0.get(file) else {
            bail!("input {} does not exist ({} given)", file + 1, self.0.len());
        };
        let pages = parse_page_ranges(&selector.pages, uids.len())
            .with_context(|| format!("in input {}", file + 1))?;
        Ok((file, pages.into_iter().map(|page| uids[page - 1]).collect()))
    }
}

fn assemble_pdfs(inputs: &[PathBuf], edits: &Edits, output: &Path, assume_yes: bool) -> Result<()> {
    if inputs.len() == 1 {
        println!("⚠️ Note: Only one input file provided. This will copy/repair the PDF.");
    }

    let mut session = Session::new();
    let mut doc_ids = Vec::new();
    let mut failed = 0;
    for input in inputs {
        match session.load_path(input) {
            Ok(doc_id) => doc_ids.push(doc_id),
            Err(e) => {
                eprintln!("{} {}: {}", style("✗").red(), input.display(), e);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} input(s) could not be loaded", failed, inputs.len());
    }

    let mut plans = Vec::with_capacity(doc_ids.len());
    let mut table: Vec<Vec<PageUid>> = Vec::with_capacity(doc_ids.len());
    for &doc_id in &doc_ids {
        let pages = session.build_catalog(&[doc_id])?;
        table.push(pages.iter().map(|page| page.uid).collect());
        plans.push(AssemblyPlan::new(&pages));
    }
    let table = InputPages(table);

    for selector in &edits.deletes {
        let (file, uids) = table.resolve(selector)?;
        for uid in uids {
            plans[file].delete(uid)?;
        }
    }
    for (selector, degrees) in &edits.rotations {
        let (file, mut uids) = table.resolve(selector)?;
        uids.sort_unstable();
        uids.dedup();
        for uid in uids {
            plans[file]
                .rotate(uid, *degrees)
                .with_context(|| format!("cannot rotate input {}", file + 1))?;
        }
    }

    let mut plan = AssemblyPlan::merge(&plans.iter().collect::<Vec<_>>())?;
    if !edits.order.is_empty() {
        let mut order = Vec::new();
        for selector in &edits.order {
            order.extend(table.resolve(selector)?.1);
        }
        plan.reorder(&order)
            .context("--order must list every kept page exactly once")?;
    }

    let Some(output) = confirm_output(output, assume_yes)? else {
        return Ok(());
    };

    println!("Assembling {} page(s) from {} PDF(s)...", plan.kept_count(), inputs.len());
    let options = AssembleOptions::new().with_output_name(output.to_string_lossy());
    let assembled = session.assemble(&plan, &options)?;
    std::fs::write(&assembled.suggested_name, &assembled.bytes)
        .with_context(|| format!("Failed to save: {}", assembled.suggested_name))?;
    println!(
        "{} Saved {} page(s): {}",
        style("✓").green(),
        assembled.page_count,
        assembled.suggested_name
    );
    Ok(())
}

/// Parse `1,3,5-10,12-` into 1-based page numbers, keeping the given order.
fn parse_page_ranges(spec: &str, total_pages: usize) -> Result<Vec<usize>> {
    if total_pages == 0 {
        bail!("PDF has no pages");
    }

    let parse = |raw: &str| -> Result<usize> {
        let page = raw
            .trim()
            .parse::<usize>()
            .map_err(|_| anyhow::anyhow!("Invalid page number: '{}'", raw.trim()))?;
        if page < 1 || page > total_pages {
            bail!("Page {} is out of range (PDF has {} pages)", page, total_pages);
        }
        Ok(page)
    };

    let mut pages = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse(start)?;
                let end = if end.trim().is_empty() {
                    total_pages
                } else {
                    parse(end)?
                };
                if start > end {
                    bail!("Invalid range: '{}' (start > end)", part);
                }
                pages.extend(start..=end);
            }
            None => pages.push(parse(part)?),
        }
    }

    if pages.is_empty() {
        bail!("No pages selected by '{}'", spec);
    }
    Ok(pages)
}

/// Ask before clobbering an existing output. `None` means the user aborted.
fn confirm_output(output: &Path, assume_yes: bool) -> Result<Option<PathBuf>> {
    if assume_yes || !output.exists() {
        return Ok(Some(output.to_path_buf()));
    }

    let term = Term::stdout();
    term.write_str(&format!(
        "{} Output '{}' already exists. Action? (Y=overwrite, R=rename, N=abort): ",
        style("⚠️").yellow(),
        output.display()
    ))?;
    let choice = term.read_line()?;
    match choice.trim().to_lowercase().as_str() {
        "y" | "yes" => Ok(Some(output.to_path_buf())),
        "r" | "rename" => {
            term.write_str("Enter a new filename or folder (e.g., report.pdf or ./out): ")?;
            let answer = term.read_line()?;
            let answer = answer.trim();
            if answer.is_empty() {
                println!("Empty path. Aborted.");
                return Ok(None);
            }
            let mut renamed = PathBuf::from(answer);
            if renamed.is_dir() {
                if let Some(filename) = output.file_name() {
                    renamed.push(filename);
                }
            }
            if renamed.exists() {
                println!(
                    "{} Output '{}' already exists. Aborted to prevent overwrite.",
                    style("❌").red(),
                    renamed.display()
                );
                return Ok(None);
            }
            Ok(Some(renamed))
        }
        _ => {
            println!("Aborted.");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_ranges_keep_order() {
        assert_eq!(parse_page_ranges("3,1-2", 5).unwrap(), vec![3, 1, 2]);
        assert_eq!(parse_page_ranges("4-", 5).unwrap(), vec![4, 5]);
        assert_eq!(parse_page_ranges(" 2 , 5 ", 5).unwrap(), vec![2, 5]);
    }

    #[test]
    fn test_page_ranges_reject_bad_input() {
        assert!(parse_page_ranges("0", 5).is_err());
        assert!(parse_page_ranges("6", 5).is_err());
        assert!(parse_page_ranges("4-2", 5).is_err());
        assert!(parse_page_ranges("-3", 5).is_err());
        assert!(parse_page_ranges("x", 5).is_err());
        assert!(parse_page_ranges("", 5).is_err());
        assert!(parse_page_ranges("1", 0).is_err());
    }

    #[test]
    fn test_selectors() {
        let selector = parse_selector("2:1-3").unwrap();
        assert_eq!(selector.file, Some(1));
        assert_eq!(selector.pages, "1-3");

        let selector = parse_selector("4").unwrap();
        assert_eq!(selector.file, None);
        assert!(parse_selector("0:1").is_err());

        let (selector, degrees) = parse_rotation("1:2=-90").unwrap();
        assert_eq!(selector.file, Some(0));
        assert_eq!(degrees, -90);
        assert!(parse_rotation("1:2").is_err());
    }
}

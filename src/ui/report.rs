//! Plain-terminal rendering of stored runs.

use console::{StyledObject, style};

use crate::models::{Catalog, PageOutcome, RunRecord};
use crate::ui::icons::{CHECK, CROSS};

/// Color a 0–100 score using Lighthouse's bands: 90+ good, 50+ needs work.
pub fn score_style(score: u8) -> StyledObject<String> {
    let text = format!("{:>3}", score);
    match score {
        90..=100 => style(text).green(),
        50..=89 => style(text).yellow(),
        _ => style(text).red(),
    }
}

pub fn print_results(record: &RunRecord) {
    println!();
    println!("{}", style(&record.sitemap_url).bold());
    println!(
        "  run {}  ({} pages, {} failed)",
        style(&record.timestamp).cyan(),
        record.results.len(),
        record.failed()
    );
    println!();
    println!(
        "  {:<4} {:>4} {:>4} {:>4} {:>4}  {:<8} {:<8} {:<8}  URL",
        "", "PERF", "A11Y", "BP", "SEO", "FCP", "LCP", "TBT"
    );
    for result in &record.results {
        match &result.outcome {
            PageOutcome::Success(scores) => println!(
                "  {:<4} {} {} {} {}  {:<8} {:<8} {:<8}  {}",
                CHECK,
                score_style(scores.performance),
                score_style(scores.accessibility),
                score_style(scores.best_practices),
                score_style(scores.seo),
                scores.metrics.fcp,
                scores.metrics.lcp,
                scores.metrics.tbt,
                result.url
            ),
            PageOutcome::Failure { error } => println!(
                "  {:<4} {}  {}",
                CROSS,
                style(error).red(),
                result.url
            ),
        }
    }
    println!();
}

pub fn print_catalog(catalog: &Catalog, runs: &[(String, Vec<String>)]) {
    if catalog.sitemap_urls.is_empty() {
        println!("No stored runs.");
        return;
    }
    for (sitemap_url, timestamps) in runs {
        println!("{}", style(sitemap_url).bold());
        for ts in timestamps {
            println!("  {}", style(ts).cyan());
        }
    }
    println!();
    println!(
        "{} sitemap(s), {} run timestamp(s)",
        catalog.sitemap_urls.len(),
        catalog.timestamps.len()
    );
}

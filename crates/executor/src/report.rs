use csv::WriterBuilder;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::error::Error;
use common::types::WeightedCycle;
use fx_cycles_core::SearchReport;

#[derive(Debug, Serialize)]
struct CycleRow<'a> {
    pass: u64,
    rank: usize,
    path: &'a str,
    hops: usize,
    product: f64,
    profit_pct: f64,
    truncated: bool,
}

/// Presents ranked cycles: one log line each, and optionally one CSV row each.
///
/// A search cut short by its expansion budget is flagged on every line and row, since its
/// ranking only covers the part of the graph that was explored.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    csv_path: Option<PathBuf>,
}

impl Reporter {
    pub fn new(csv_path: Option<PathBuf>) -> Self {
        Reporter { csv_path }
    }

    pub fn report(&self, pass: u64, report: &SearchReport<String>) -> Result<(), Error> {
        let cycles = &report.cycles;
        let truncated = report.stats.truncated;

        if truncated {
            warn!(
                pass,
                expansions = report.stats.expansions,
                "Search was truncated, ranking is partial."
            );
        }

        if cycles.is_empty() {
            info!(pass, truncated, "No profitable cycles detected.");
        } else {
            info!(pass, truncated, count = cycles.len(), "Profitable cycles detected:");
            for line in render(cycles) {
                info!(pass, truncated, "{}", line);
            }
        }

        if let Some(path) = &self.csv_path {
            self.append_csv(path, pass, cycles, truncated)?;
        }
        Ok(())
    }

    /// Appends `cycles` to the file at `path`, writing the header only when the file is new.
    fn append_csv(
        &self,
        path: &Path,
        pass: u64,
        cycles: &[WeightedCycle<String>],
        truncated: bool,
    ) -> Result<(), Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut wtr = WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);

        for (idx, cycle) in cycles.iter().enumerate() {
            let route = cycle.route();
            wtr.serialize(CycleRow {
                pass,
                rank: idx + 1,
                path: &route,
                hops: cycle.hop_count(),
                product: cycle.product,
                profit_pct: cycle.profit_percentage(),
                truncated,
            })?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// One display line per cycle, ranked from 1.
pub fn render(cycles: &[WeightedCycle<String>]) -> Vec<String> {
    cycles
        .iter()
        .enumerate()
        .map(|(idx, cycle)| format!("#{} Cycle: {}", idx + 1, cycle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fx_cycles_core::SearchStats;
    use tempfile::tempdir;

    fn cycle(units: &[&str], rates: &[f64]) -> WeightedCycle<String> {
        WeightedCycle {
            units: units.iter().map(|u| u.to_string()).collect(),
            rates: rates.to_vec(),
            product: rates.iter().product(),
        }
    }

    fn complete(cycles: Vec<WeightedCycle<String>>) -> SearchReport<String> {
        SearchReport {
            cycles,
            stats: SearchStats::default(),
        }
    }

    #[test]
    fn render_numbers_each_cycle() {
        let lines = render(&[
            cycle(&["EUR", "JPY", "USD"], &[160.0, 0.0075, 0.90]),
            cycle(&["AUD", "USD"], &[0.66, 1.52]),
        ]);

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("#1 Cycle: EUR -> JPY -> USD -> EUR with product: 1.08"));
        assert!(lines[1].starts_with("#2 Cycle: AUD -> USD -> AUD"));
    }

    #[test]
    fn csv_rows_are_appended_across_passes() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("cycles.csv");
        let reporter = Reporter::new(Some(path.clone()));

        reporter
            .report(
                1,
                &complete(vec![cycle(&["EUR", "JPY", "USD"], &[160.0, 0.0075, 0.90])]),
            )
            .unwrap();
        reporter.report(2, &complete(Vec::new())).unwrap();
        reporter
            .report(3, &complete(vec![cycle(&["AUD", "USD"], &[0.66, 1.52])]))
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines.len(), 3, "one header and two rows: {}", content);
        assert_eq!(lines[0], "pass,rank,path,hops,product,profit_pct,truncated");
        assert!(lines[1].starts_with("1,1,EUR -> JPY -> USD -> EUR,3,"));
        assert!(lines[1].ends_with(",false"));
        assert!(lines[2].starts_with("3,1,AUD -> USD -> AUD,2,"));
    }

    #[test]
    fn truncated_search_marks_every_row() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("cycles.csv");
        let reporter = Reporter::new(Some(path.clone()));

        let report = SearchReport {
            cycles: vec![
                cycle(&["A", "B"], &[2.0, 1.0]),
                cycle(&["B", "C"], &[1.5, 1.0]),
            ],
            stats: SearchStats {
                expansions: 1,
                truncated: true,
                ..SearchStats::default()
            },
        };
        reporter.report(7, &report).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<&str> = content.lines().skip(1).collect();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.ends_with(",true")), "{}", content);
    }

    #[test]
    fn reporting_without_csv_touches_nothing() {
        let reporter = Reporter::default();
        assert!(reporter.report(1, &complete(Vec::new())).is_ok());
    }
}

//! Implements InputPort. Inquire-based interactive menu.
//!
//! Main menu: import, export, nightly run, case management. Loops until Quit or Esc.

use crate::domain::{Case, DomainError};
use crate::ports::{CaseAdmin, InputPort};
use crate::usecases::export_service::current_period;
use crate::usecases::{ExportService, ImportService, SchedulerService};
use async_trait::async_trait;
use chrono::FixedOffset;
use inquire::error::InquireError;
use inquire::{Confirm, CustomType, Select, Text};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    Import,
    ExportCurrent,
    ExportOther,
    Nightly,
    Cases,
    Quit,
}

impl MenuItem {
    const ALL: [MenuItem; 6] = [
        MenuItem::Import,
        MenuItem::ExportCurrent,
        MenuItem::ExportOther,
        MenuItem::Nightly,
        MenuItem::Cases,
        MenuItem::Quit,
    ];
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MenuItem::Import => "Import new reports from Slack",
            MenuItem::ExportCurrent => "Export this month",
            MenuItem::ExportOther => "Export another month",
            MenuItem::Nightly => "Run nightly job now (import + export)",
            MenuItem::Cases => "Manage cases",
            MenuItem::Quit => "Quit",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaseAction {
    List,
    Add,
    Deactivate,
    Activate,
    Back,
}

impl fmt::Display for CaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CaseAction::List => "List cases",
            CaseAction::Add => "Register a case",
            CaseAction::Deactivate => "Deactivate a case",
            CaseAction::Activate => "Reactivate a case",
            CaseAction::Back => "Back",
        };
        f.write_str(s)
    }
}

/// One line per case, as shown in the menu and by `cases list`.
pub fn format_case(case: &Case) -> String {
    format!(
        "{}  {}{}",
        case.unique_key,
        case.name,
        if case.is_active { "" } else { "  (inactive)" }
    )
}

/// Esc / Ctrl-C on a prompt means "back", not failure.
fn is_cancel(e: &InquireError) -> bool {
    matches!(
        e,
        InquireError::OperationCanceled | InquireError::OperationInterrupted
    )
}

fn prompt_error(e: InquireError) -> DomainError {
    DomainError::Config(format!("prompt failed: {}", e))
}

/// TUI adapter. Inquire prompts.
pub struct TuiInputPort {
    import: Arc<ImportService>,
    export: Arc<ExportService>,
    scheduler: Arc<SchedulerService>,
    cases: Arc<dyn CaseAdmin>,
    offset: FixedOffset,
}

impl TuiInputPort {
    pub fn new(
        import: Arc<ImportService>,
        export: Arc<ExportService>,
        scheduler: Arc<SchedulerService>,
        cases: Arc<dyn CaseAdmin>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            import,
            export,
            scheduler,
            cases,
            offset,
        }
    }

    async fn run_item(&self, item: MenuItem) -> Result<(), DomainError> {
        match item {
            MenuItem::Import => {
                let stats = self.import.run_import().await?;
                println!(
                    "Fetched {} messages, {} reports, {} new records ({} already imported).",
                    stats.messages_fetched,
                    stats.messages_matched,
                    stats.records_created,
                    stats.duplicates_skipped
                );
            }
            MenuItem::ExportCurrent => {
                let (year, month) = current_period(self.offset);
                self.export_period(year, month).await?;
            }
            MenuItem::ExportOther => {
                let (cur_year, cur_month) = current_period(self.offset);
                let year = match CustomType::<i32>::new("Year:")
                    .with_default(cur_year)
                    .prompt()
                {
                    Ok(y) => y,
                    Err(e) if is_cancel(&e) => return Ok(()),
                    Err(e) => return Err(prompt_error(e)),
                };
                let month = match CustomType::<u32>::new("Month (1-12):")
                    .with_default(cur_month)
                    .prompt()
                {
                    Ok(m) => m,
                    Err(e) if is_cancel(&e) => return Ok(()),
                    Err(e) => return Err(prompt_error(e)),
                };
                self.export_period(year, month).await?;
            }
            MenuItem::Nightly => {
                let report = self.scheduler.run_nightly().await?;
                match &report.import {
                    Some(stats) => println!("Imported {} new records.", stats.records_created),
                    None => println!("Import failed; see log. Export used stored records."),
                }
                println!(
                    "Export: {} rows -> {}{}",
                    report.export.rows,
                    report.export.path.display(),
                    if report.export.delivered {
                        " (posted to Slack)"
                    } else {
                        ""
                    }
                );
            }
            MenuItem::Cases => self.manage_cases().await?,
            MenuItem::Quit => {}
        }
        Ok(())
    }

    async fn export_period(&self, year: i32, month: u32) -> Result<(), DomainError> {
        let deliver = match Confirm::new("Post the file to Slack?")
            .with_default(true)
            .prompt()
        {
            Ok(d) => d,
            Err(e) if is_cancel(&e) => return Ok(()),
            Err(e) => return Err(prompt_error(e)),
        };
        let outcome = self.export.export_and_deliver(year, month, deliver).await?;
        println!(
            "{}-{:02}: {} rows, {} h -> {}{}",
            year,
            month,
            outcome.rows,
            outcome.total_hours,
            outcome.path.display(),
            if outcome.delivered {
                " (posted to Slack)"
            } else {
                ""
            }
        );
        Ok(())
    }

    async fn manage_cases(&self) -> Result<(), DomainError> {
        let actions = vec![
            CaseAction::List,
            CaseAction::Add,
            CaseAction::Deactivate,
            CaseAction::Activate,
            CaseAction::Back,
        ];
        let action = match Select::new("Cases:", actions).prompt() {
            Ok(a) => a,
            Err(e) if is_cancel(&e) => return Ok(()),
            Err(e) => return Err(prompt_error(e)),
        };
        match action {
            CaseAction::List => {
                let cases = self.cases.list_cases().await?;
                if cases.is_empty() {
                    println!("No cases registered.");
                }
                for case in &cases {
                    println!("{}", format_case(case));
                }
            }
            CaseAction::Add => {
                let name = match Text::new("Case name:").prompt() {
                    Ok(n) => n,
                    Err(e) if is_cancel(&e) => return Ok(()),
                    Err(e) => return Err(prompt_error(e)),
                };
                let case = self.cases.register_case(&name).await?;
                println!("Registered {}", format_case(&case));
            }
            CaseAction::Deactivate | CaseAction::Activate => {
                let active = action == CaseAction::Activate;
                let candidates: Vec<Case> = self
                    .cases
                    .list_cases()
                    .await?
                    .into_iter()
                    .filter(|c| c.is_active != active)
                    .collect();
                if candidates.is_empty() {
                    println!("Nothing to change.");
                    return Ok(());
                }
                let labels: Vec<String> = candidates.iter().map(format_case).collect();
                let picked = match Select::new("Case:", labels.clone()).prompt() {
                    Ok(p) => p,
                    Err(e) if is_cancel(&e) => return Ok(()),
                    Err(e) => return Err(prompt_error(e)),
                };
                if let Some(case) = labels
                    .iter()
                    .position(|l| *l == picked)
                    .map(|i| &candidates[i])
                {
                    self.cases
                        .set_case_active(&case.unique_key, active)
                        .await?;
                    println!(
                        "{} is now {}",
                        case.unique_key,
                        if active { "active" } else { "inactive" }
                    );
                }
            }
            CaseAction::Back => {}
        }
        Ok(())
    }
}

#[async_trait]
impl InputPort for TuiInputPort {
    async fn run(&self) -> Result<(), DomainError> {
        loop {
            let item = match Select::new("What do you want to do?", MenuItem::ALL.to_vec()).prompt()
            {
                Ok(item) => item,
                Err(e) if is_cancel(&e) => return Ok(()),
                Err(e) => return Err(prompt_error(e)),
            };
            if item == MenuItem::Quit {
                return Ok(());
            }
            // A failed action is reported and the menu comes back.
            if let Err(e) = self.run_item(item).await {
                println!("Error: {}", e);
                tracing::warn!(action = %item, error = %e, "menu action failed");
            }
        }
    }
}

//! End-to-end tests for `tl export` and `tl rate`.
//!
//! Runs the binary against a time entry file and a config file with fixed
//! exchange rates, so no network access is needed.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn tl_binary() -> String {
    env!("CARGO_BIN_EXE_tl").to_string()
}

const CONFIG: &str = r#"
agency_markup = "0.75"

[rates]
"USD/EUR" = "0.9"
"CHF/EUR" = "1.05"
"#;

fn time_entry(user: &str, client: &str, project: &str, task: &str, hours: &str, rate: &str, currency: &str) -> String {
    format!(
        r#"{{
            "user": {{"name": "{user}"}},
            "client": {{"name": "{client}", "currency": "{currency}"}},
            "project": {{"name": "{project}"}},
            "task": {{"name": "{task}"}},
            "rounded_hours": {hours},
            "billable": true,
            "task_assignment": {{"hourly_rate": {rate}}}
        }}"#
    )
}

/// Alice's January: internal UK and CH work plus one external client.
fn alice_entries() -> Vec<String> {
    vec![
        time_entry("Alice", "Acme - UK", "Acme - UK", "Dev", "2", "100", "EUR"),
        time_entry("Alice", "Acme - UK", "Acme - UK", "Dev", "3", "100", "EUR"),
        time_entry("Alice", "Bern AG", "Bern AG - CH", "Ops", "1.5", "120", "CHF"),
        time_entry("Alice", "External - FooCo", "External - FooCo", "", "1", "50", "USD"),
    ]
}

struct Fixture {
    temp: TempDir,
    config: PathBuf,
    input: PathBuf,
}

impl Fixture {
    fn new(entries: &[String]) -> Self {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        let input = temp.path().join("entries.json");
        std::fs::write(&config, CONFIG).unwrap();
        std::fs::write(
            &input,
            format!(r#"{{"time_entries": [{}], "links": {{"next": null}}}}"#, entries.join(",")),
        )
        .unwrap();
        Self {
            temp,
            config,
            input,
        }
    }

    fn home(&self) -> &Path {
        self.temp.path()
    }

    fn export(&self, args: &[&str]) -> Output {
        Command::new(tl_binary())
            .env("HOME", self.home())
            .env_remove("XDG_CONFIG_HOME")
            .env_remove("HARVEST_USER")
            .env_remove("TL_HARVEST_USER")
            .arg("--config")
            .arg(&self.config)
            .arg("export")
            .arg("--input")
            .arg(&self.input)
            .args(["--start", "20240101", "--end", "20240131"])
            .args(args)
            .output()
            .expect("failed to run tl export")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_humanreadable_report_for_all_tasks() {
    let fixture = Fixture::new(&alice_entries());
    let output = fixture.export(&["--all"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        stdout(&output),
        "time: 20240101 -> 20240131\n\
         Alice:\n  \
         Acme - UK/Dev: 5h, 375.00 EUR -> 375.00 EUR\n  \
         Bern AG/Ops: 1.5h, 135.00 CHF -> 141.75 EUR\n  \
         External - FooCo/: 1h, 50.00 USD -> 45.00 EUR\n\
         Exchange rates\n\
         1 CHF -> 1.05 EUR\n\
         1 USD -> 0.9 EUR\n"
    );
}

#[test]
fn test_default_report_excludes_external_clients() {
    let fixture = Fixture::new(&alice_entries());
    let output = fixture.export(&["--format", "csv"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = stdout(&output);
    let rows: Vec<_> = stdout.lines().skip(1).collect();
    assert_eq!(
        rows,
        vec![
            "Alice,20240101,20240131,Acme - UK,Dev,Numtide Ltd.,5,75.00,375.00,EUR,75.00,375.00,EUR,1",
            "Alice,20240101,20240131,Bern AG,Ops,Numtide Sàrl,1.5,90.00,135.00,CHF,94.50,141.75,EUR,1.05",
        ]
    );
}

#[test]
fn test_country_filter() {
    let fixture = Fixture::new(&alice_entries());
    let output = fixture.export(&["--country", "CH", "--format", "json"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let rows: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["client"], "Bern AG");
    assert_eq!(rows[0]["target_cost"], 141.75);
}

#[test]
fn test_client_filter_includes_external_client() {
    let fixture = Fixture::new(&alice_entries());
    let output = fixture.export(&["--client", "External - FooCo", "--format", "csv"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = stdout(&output);
    assert_eq!(stdout.lines().count(), 2);
    assert!(stdout.contains("External - FooCo,,none,1,50.00,50.00,USD,45.00,45.00,EUR,0.9"));
}

#[test]
fn test_table_format() {
    let fixture = Fixture::new(&alice_entries());
    let output = fixture.export(&["--format", "table"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = stdout(&output);
    assert!(stdout.contains("target_cost"));
    assert!(stdout.contains("141.75"));
}

#[test]
fn test_unknown_user_fails_with_known_users() {
    let fixture = Fixture::new(&alice_entries());
    let output = fixture.export(&["--user", "Carol"]);

    assert!(!output.status.success());
    assert!(stdout(&output).is_empty());
    assert!(
        stderr(&output).contains("user Carol not found in time range, found Alice"),
        "stderr: {}",
        stderr(&output)
    );
}

#[test]
fn test_zero_rate_entry_warns_and_is_skipped() {
    let mut entries = alice_entries();
    entries.push(time_entry("Alice", "Acme - UK", "Acme - UK", "Dev", "8", "0", "EUR"));
    let fixture = Fixture::new(&entries);
    let output = fixture.export(&["--format", "csv"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("hourly rate for Acme - UK/Acme - UK/Dev is 0, skipped for export"));
    assert!(stdout(&output).contains(",Dev,Numtide Ltd.,5,"));
}

#[test]
fn test_warning_printed_once_when_verbose() {
    let mut entries = alice_entries();
    entries.push(time_entry("Alice", "Acme - UK", "Acme - UK", "Dev", "8", "0", "EUR"));
    let fixture = Fixture::new(&entries);
    let output = fixture.export(&["-v", "--format", "csv"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        stderr(&output)
            .matches("hourly rate for Acme - UK/Acme - UK/Dev is 0")
            .count(),
        1
    );
}

#[test]
fn test_currency_change_aborts_without_output() {
    let mut entries = alice_entries();
    entries.push(time_entry("Alice", "Acme - UK", "Acme - UK", "Dev", "1", "100", "GBP"));
    let fixture = Fixture::new(&entries);
    let output = fixture.export(&[]);

    assert!(!output.status.success());
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("currency of Alice/Acme - UK/Dev changed from EUR to GBP"));
}

#[test]
fn test_month_conflicts_with_range() {
    let fixture = Fixture::new(&alice_entries());
    let output = fixture.export(&["--month", "2"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("--month"));
}

#[test]
fn test_rate_command_uses_configured_rates() {
    let fixture = Fixture::new(&[]);
    let output = Command::new(tl_binary())
        .env("HOME", fixture.home())
        .env_remove("XDG_CONFIG_HOME")
        .arg("--config")
        .arg(&fixture.config)
        .args(["rate", "eur", "usd"])
        .output()
        .expect("failed to run tl rate");

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "1 EUR -> 1.111111 USD\n");
}

#[test]
fn test_kimai_timesheet_file() {
    let fixture = Fixture::new(&[]);
    let timesheets = r#"[
        {
            "id": 1,
            "duration": 7200,
            "hourlyRate": 120,
            "billable": true,
            "user": {"username": "alice", "alias": "Alice"},
            "activity": {"name": "Ops"},
            "project": {"name": "Bern AG - CH", "customer": {"name": "Bern AG", "currency": "chf"}}
        },
        {
            "id": 2,
            "duration": 1800,
            "rate": 60,
            "billable": true,
            "user": {"username": "alice", "alias": "Alice"},
            "activity": {"name": "Ops"},
            "project": {"name": "Bern AG - CH", "customer": {"name": "Bern AG", "currency": "CHF"}}
        }
    ]"#;
    let input = fixture.home().join("timesheets.json");
    std::fs::write(&input, timesheets).unwrap();

    let output = Command::new(tl_binary())
        .env("HOME", fixture.home())
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("KIMAI_USER")
        .env_remove("TL_KIMAI_USER")
        .arg("--config")
        .arg(&fixture.config)
        .args(["export", "--source", "kimai", "--input"])
        .arg(&input)
        .args(["--month", "1", "--year", "2024", "--format", "csv"])
        .output()
        .expect("failed to run tl export");

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = stdout(&output);
    let rows: Vec<_> = stdout.lines().skip(1).collect();
    assert_eq!(
        rows,
        vec!["Alice,20240101,20240131,Bern AG,Ops,Numtide Sàrl,2.5,90.00,225.00,CHF,94.50,236.25,EUR,1.05"]
    );
}

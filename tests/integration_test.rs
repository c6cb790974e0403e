use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Result};
use tempfile::NamedTempFile;

fn run_gateway(input: &Path) -> Result<String> {
    let binary_path = env!("CARGO_BIN_EXE_payment-gateway");

    let output = Command::new(binary_path)
        .arg(input)
        .output()?;

    assert!(output.status.success());

    Ok(String::from_utf8(output.stdout)?)
}

fn parse_report(stdout: &str) -> HashMap<String, (String, String)> {
    stdout.lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(',').collect();
            match fields.as_slice() {
                [account, balance, pending] => Some((account.to_string(), (balance.to_string(), pending.to_string()))),
                _ => None
            }
        })
        .collect()
}

#[test]
fn test_cli_correctly_processes_sample() -> Result<()> {
    let stdout = run_gateway(&Path::new("samples").join("sample.csv"))?;
    let mut lines = stdout.lines();

    assert_eq!(lines.next(), Some("account,balance,pending"));

    for line in lines {
        let fields: Vec<&str> = line.split(',').collect();

        assert_eq!(fields.len(), 3);

        let _: f64 = fields[1].parse()?;
        let _: usize = fields[2].parse()?;
    }

    let report = parse_report(&stdout);
    let acme = report.get("acme").ok_or_else(|| anyhow!("acme missing from output"))?;
    let globex = report.get("globex").ok_or_else(|| anyhow!("globex missing from output"))?;
    let initech = report.get("initech").ok_or_else(|| anyhow!("initech missing from output"))?;

    assert_eq!(acme, &("9920.50".to_string(), "1".to_string()));
    assert_eq!(globex, &("20000.01".to_string(), "0".to_string()));
    assert_eq!(initech, &("0.00".to_string(), "0".to_string()));

    Ok(())
}

#[test]
fn test_cli_outputs_correct_final_balances() -> Result<()> {
    let report = parse_report(&run_gateway(&Path::new("samples").join("fixed.csv"))?);

    let alice = report.get("alice").ok_or_else(|| anyhow!("alice missing from output"))?;
    let bob = report.get("bob").ok_or_else(|| anyhow!("bob missing from output"))?;

    // Replayed approval for a2 credits once, the late approval for rejected b1 is ignored
    // and b2 keeps waiting because its verdict was not a known status.
    assert_eq!(alice.0, "15500.00");
    assert_eq!(alice.1, "0");
    assert_eq!(bob.0, "250.25");
    assert_eq!(bob.1, "1");

    Ok(())
}

#[test]
fn test_cli_skips_malformed_rows() -> Result<()> {
    let mut file = NamedTempFile::new()?;

    writeln!(file, "type,account,invoice,amount,status")?;
    writeln!(file, "open,shop,,,")?;
    writeln!(file, "refund,shop,x,10,")?;
    writeln!(file, "submit,shop,s1,not-a-number,")?;
    writeln!(file, "submit,ghost,g1,10,")?;
    writeln!(file, "submit,shop,s2,75,")?;
    writeln!(file, "review,,unknown,,approved")?;

    let report = parse_report(&run_gateway(file.path())?);

    assert_eq!(report.len(), 1);
    assert_eq!(report.get("shop"), Some(&("75.00".to_string(), "0".to_string())));

    Ok(())
}

#[test]
fn test_cli_without_arguments_prints_usage() -> Result<()> {
    let output = Command::new(env!("CARGO_BIN_EXE_payment-gateway")).output()?;

    assert!(!output.status.success());
    assert!(String::from_utf8(output.stderr)?.contains("Usage"));

    Ok(())
}

#[test]
fn test_cli_keeps_sub_cent_precision_and_applies_adjustments() -> Result<()> {
    let mut file = NamedTempFile::new()?;

    writeln!(file, "type,account,invoice,amount,status")?;
    writeln!(file, "open,kiosk,,,")?;
    writeln!(file, "submit,kiosk,k1,10.005,")?;
    writeln!(file, "adjust,kiosk,,5,")?;
    writeln!(file, "submit,kiosk,k2,30000,")?;
    writeln!(file, "republish,,k2,,")?;
    writeln!(file, "query,kiosk,k2,,")?;

    let report = parse_report(&run_gateway(file.path())?);

    assert_eq!(report.get("kiosk"), Some(&("15.005".to_string(), "1".to_string())));

    Ok(())
}

//! End-to-end runs of the CLI pipeline against the scripted browser:
//! CSV file in, CSV/JSON file out.

use std::sync::Arc;

use encoding_rs::SHIFT_JIS;
use mapreviews::testing::{ScriptedPage, ScriptedRenderer};
use mapreviews::{CancelToken, JobStatus, Orchestrator, ScrapeConfig};
use mapreviews_cli::input::read_jobs;
use mapreviews_cli::output::{self, OutputFormat};
use mapreviews_cli::run::run_jobs;

const PLACE_A: &str = "https://www.google.com/maps/place/A/data=!4m6!3m5!1s0x0:0xa!8m2";

fn orchestrator(renderer: ScriptedRenderer) -> Orchestrator {
    let mut config = ScrapeConfig::default();
    config.batch.allow_short_delay = true;
    config.batch.min_delay_secs = 0;
    Orchestrator::new(Arc::new(renderer), config)
}

#[tokio::test(start_paused = true)]
async fn csv_batch_to_csv_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("places.csv");
    let text = format!("店舗名,住所,URL,件数\nカフェA,,{PLACE_A},5\n,,,\n");
    let (encoded, _, _) = SHIFT_JIS.encode(&text);
    std::fs::write(&input, &encoded).unwrap();

    let jobs = read_jobs(&input, 50).unwrap();
    assert_eq!(jobs.len(), 2);

    let renderer = ScriptedRenderer::new(ScriptedPage::capable(30));
    let log = renderer.log();
    let batch = run_jobs(orchestrator(renderer), jobs, &CancelToken::never(), false).await;

    assert_eq!(batch.jobs[0].status, JobStatus::Succeeded);
    assert!(matches!(
        batch.jobs[1].status,
        JobStatus::Failed { ref reason, .. } if reason == "empty-input"
    ));
    // the browser is torn down once the batch is over
    assert!(log.lock().unwrap().calls.iter().any(|c| c == "shutdown"));

    let out = dir.path().join("out.csv");
    output::write(&batch, OutputFormat::Csv, &out).unwrap();
    let bytes = std::fs::read(&out).unwrap();
    assert!(bytes.starts_with(b"\xEF\xBB\xBF"));

    let mut reader = csv::Reader::from_reader(&bytes[3..]);
    let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(header[0], "review_id");
    assert_eq!(&header[9..], ["店舗名", "住所", "URL", "件数"]);

    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 5);
    assert_eq!(&rows[0][6], "10");
    assert_eq!(&rows[0][7], "テスト珈琲 本店");
    assert_eq!(&rows[0][9], "カフェA");
    let mut ids: Vec<&str> = rows.iter().map(|r| &r[0]).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn json_report_marks_short_results() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("places.csv");
    std::fs::write(&input, format!("\u{feff}url,count\n{PLACE_A},40\n")).unwrap();

    let jobs = read_jobs(&input, 50).unwrap();
    let renderer = ScriptedRenderer::new(ScriptedPage::capable(12));
    let batch = run_jobs(orchestrator(renderer), jobs, &CancelToken::never(), false).await;

    let out = dir.path().join("out.json");
    output::write(&batch, OutputFormat::Json, &out).unwrap();
    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();

    let job = &report["jobs"][0];
    assert_eq!(job["status"], "succeeded");
    assert_eq!(job["requested"], 40);
    assert_eq!(job["obtained"], 12);
    assert_eq!(job["short"], true);
    assert_eq!(report["summary"]["reviews"], 12);
}

#[tokio::test]
async fn browser_unavailable_fails_every_job() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("places.csv");
    std::fs::write(&input, "name\nカフェA\nカフェB\n").unwrap();

    let jobs = read_jobs(&input, 10).unwrap();
    let batch = run_jobs(
        orchestrator(ScriptedRenderer::failing()),
        jobs,
        &CancelToken::never(),
        false,
    )
    .await;

    assert_eq!(batch.summary().failed, 2);
    let lines = output::summary_lines(&batch);
    assert!(lines.iter().all(|l| l.contains("FAILED browser")));
}

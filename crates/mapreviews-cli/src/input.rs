// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Batch CSV input.
//!
//! Files exported from Japanese spreadsheets arrive as UTF-8 (often with a
//! BOM) or Shift_JIS. Each row becomes one job: a URL column wins, otherwise
//! the name and address columns are joined into a search query. Every input
//! column is carried through as a tag so it reappears in the output rows.

use encoding_rs::{SHIFT_JIS, UTF_8};
use mapreviews::{ScrapeJob, TargetSpec};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum InputError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no URL, name or address column in header: {0}")]
    NoUsableColumns(String),
}

/// Name and address headers, in the order they are joined.
const QUERY_HEADERS: &[&str] = &["店舗名", "院名", "name", "名前", "住所", "address"];
const COUNT_HEADERS: &[&str] = &["件数", "count", "口コミ数"];

/// Decode raw bytes. Returns the text and the encoding that was used.
pub fn decode(bytes: &[u8]) -> (String, &'static str) {
    let (text, _, malformed) = UTF_8.decode(bytes);
    if !malformed {
        return (text.into_owned(), "UTF-8");
    }
    let (text, _, _) = SHIFT_JIS.decode(bytes);
    (text.into_owned(), "Shift_JIS")
}

/// Which header indices feed the job fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub url: Option<usize>,
    pub query: Vec<usize>,
    pub count: Option<usize>,
}

impl ColumnMap {
    pub fn detect(headers: &[String]) -> Result<Self, InputError> {
        let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

        let url = normalized
            .iter()
            .position(|h| h.contains("url") || h.contains("マップ") || h.contains("map"));

        let query = QUERY_HEADERS
            .iter()
            .filter_map(|want| normalized.iter().position(|h| h == want))
            .collect::<Vec<_>>();

        let count = COUNT_HEADERS
            .iter()
            .find_map(|want| normalized.iter().position(|h| h == want));

        if url.is_none() && query.is_empty() {
            return Err(InputError::NoUsableColumns(headers.join(", ")));
        }
        Ok(Self { url, query, count })
    }
}

fn parse_count(raw: &str) -> Option<usize> {
    let digits = raw.trim().trim_end_matches('件').replace(',', "");
    digits.parse::<usize>().ok().filter(|n| *n > 0)
}

/// Turn CSV text into jobs. Rows with neither a URL nor a name/address come
/// back as jobs already failed with `empty-input`.
pub fn jobs_from_csv(text: &str, default_count: usize) -> Result<Vec<ScrapeJob>, InputError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let columns = ColumnMap::detect(&headers)?;
    tracing::debug!(?columns, "input columns");

    let mut jobs = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        // header is line 1
        let line = i + 2;
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");

        let tags: Vec<(String, String)> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();

        let count = parse_count(field(columns.count)).unwrap_or(default_count);

        let url = field(columns.url);
        let query = columns
            .query
            .iter()
            .filter_map(|i| record.get(*i))
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let job = if !url.is_empty() {
            ScrapeJob::new(TargetSpec::Url(url.to_string()), count).with_tags(tags)
        } else if !query.is_empty() {
            ScrapeJob::new(TargetSpec::Search(query), count).with_tags(tags)
        } else {
            let mut job = ScrapeJob::new(TargetSpec::Search(String::new()), count).with_tags(tags);
            job.fail("empty-input", format!("line {line}: no URL or name/address"));
            job
        };
        jobs.push(job);
    }
    Ok(jobs)
}

/// Read and decode a batch file.
pub fn read_jobs(path: &Path, default_count: usize) -> Result<Vec<ScrapeJob>, InputError> {
    let bytes = std::fs::read(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let (text, encoding) = decode(&bytes);
    tracing::info!(path = %path.display(), encoding, "reading batch input");
    jobs_from_csv(&text, default_count)
}

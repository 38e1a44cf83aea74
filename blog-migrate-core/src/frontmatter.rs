//! Post loading: splits a raw post file into its YAML front-matter and body,
//! and derives the values the rest of the pipeline needs (title, publish date,
//! original URL).
//!
//! # Format
//! ```markdown
//! ---
//! title: Hello
//! date: 2015-03-02 10:00:00 +0000
//! ---
//! Body goes here
//! ```
//! A file that does not open with a `---` line has no front-matter: the whole
//! text is the body.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ParseError;

/// A post as read from disk. Derived content is computed from it, never written back.
#[derive(Debug, Clone)]
pub struct Post {
    pub path: PathBuf,
    pub front_matter: Mapping,
    pub body: String,
}

impl Post {
    /// Read and parse a post file.
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ParseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        parse_post(path, &raw)
    }

    /// Look up a top-level front-matter key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.front_matter.get(key)
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(scalar_to_string)
    }

    pub fn title(&self) -> Result<String, ParseError> {
        self.get_string("title")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ParseError::MissingField {
                path: self.path.clone(),
                field: "title",
            })
    }

    pub fn author(&self) -> Option<String> {
        self.get_string("author").filter(|a| !a.trim().is_empty())
    }

    pub fn permalink(&self) -> Option<String> {
        self.get_string("permalink")
    }

    /// `media.card.url`, the image shown on social cards.
    pub fn card_image_url(&self) -> Option<String> {
        self.get("media")
            .and_then(|media| media.get("card"))
            .and_then(|card| card.get("url"))
            .and_then(scalar_to_string)
            .filter(|u| !u.trim().is_empty())
    }

    /// True only when `published: false` is set explicitly.
    pub fn is_unpublished(&self) -> bool {
        matches!(self.get("published"), Some(Value::Bool(false)))
    }

    /// Publication timestamp: front-matter `date`, else the `YYYY-MM-DD-` file name prefix.
    pub fn date(&self) -> Result<DateTime<FixedOffset>, ParseError> {
        if let Some(date) = self.get_string("date").and_then(|d| parse_date(&d)) {
            return Ok(date);
        }
        filename_date(&self.path)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
            .ok_or_else(|| ParseError::NoDate {
                path: self.path.clone(),
            })
    }

    /// RFC 3339 UTC timestamp sent to the platform.
    pub fn published_at(&self) -> Result<String, ParseError> {
        Ok(self
            .date()?
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    /// File stem without the date prefix.
    pub fn slug(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if filename_date(&self.path).is_some() {
            stem[11..].to_string()
        } else {
            stem
        }
    }

    /// URL the post had on the old site: its permalink, or Jekyll's default
    /// `/<yyyy>/<mm>/<dd>/<slug>.html`.
    pub fn original_url(&self, site_url: &str) -> Result<String, ParseError> {
        let base = site_url.trim_end_matches('/');
        let path = match self.permalink() {
            Some(permalink) => permalink,
            None => {
                let date = self.date()?;
                format!("{}/{}.html", date.format("/%Y/%m/%d"), self.slug())
            }
        };
        if path.starts_with('/') {
            Ok(format!("{base}{path}"))
        } else {
            Ok(format!("{base}/{path}"))
        }
    }
}

/// Split raw post text into front-matter and body.
pub fn parse_post(path: &Path, raw: &str) -> Result<Post, ParseError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let no_front_matter = || Post {
        path: path.to_path_buf(),
        front_matter: Mapping::new(),
        body: raw.to_string(),
    };

    let after_open = if let Some(rest) = raw.strip_prefix("---\n") {
        rest
    } else if let Some(rest) = raw.strip_prefix("---\r\n") {
        rest
    } else {
        debug!(path = %path.display(), "No front-matter found");
        return Ok(no_front_matter());
    };

    let Some((yaml, body)) = split_at_closing_delimiter(after_open) else {
        return Err(ParseError::Unterminated {
            path: path.to_path_buf(),
        });
    };

    let front_matter = if yaml.trim().is_empty() {
        Mapping::new()
    } else {
        match serde_yaml::from_str::<Value>(yaml) {
            Ok(Value::Mapping(map)) => map,
            Ok(Value::Null) => Mapping::new(),
            Ok(_) => {
                return Err(ParseError::NotAMapping {
                    path: path.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(ParseError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    };

    debug!(path = %path.display(), keys = front_matter.len(), "Parsed front-matter");
    Ok(Post {
        path: path.to_path_buf(),
        front_matter,
        body: body.trim_start_matches(['\r', '\n']).to_string(),
    })
}

/// Returns (yaml, rest) split around the first line consisting of `---`.
fn split_at_closing_delimiter(text: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            return Some((&text[..offset], &text[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse the date formats Jekyll accepts in front-matter.
pub fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    for format in ["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%d %H:%M %z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive).fixed_offset());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
}

fn filename_date(path: &Path) -> Option<NaiveDate> {
    let stem = path.file_stem()?.to_str()?;
    if stem.len() < 11 || stem.as_bytes()[10] != b'-' {
        return None;
    }
    NaiveDate::parse_from_str(stem.get(..10)?, "%Y-%m-%d").ok()
}

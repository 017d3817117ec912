// src/sitemap/writer.rs
// =============================================================================
// Serializes sitemap entries to disk.
//
// Up to `max_entries_per_file` entries: one <urlset> document at the output
// path. More than that: contiguous chunks written to sibling files
// (sitemap.xml -> sitemap-1.xml, sitemap-2.xml, ...) and a <sitemapindex>
// at the output path pointing at each chunk by URL.
//
// Entries are written in the order given. De-duplication is the crawl
// engine's job, not ours.
// =============================================================================

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::escape::escape;
use tracing::{debug, info};
use url::Url;

use super::SitemapEntry;
use crate::error::SitemapError;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Files produced by one write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenSitemaps {
    /// The index file, present only when the entries were chunked
    pub index: Option<PathBuf>,
    /// Every <urlset> file, in chunk order
    pub sitemaps: Vec<PathBuf>,
}

/// Write `entries` to `output_path`, chunking when needed.
///
/// Index `<loc>` values are the chunk file names resolved against
/// `base_url`. When `include_lastmod` is set every index entry carries the
/// same write-time timestamp.
pub fn write_sitemaps(
    entries: &[SitemapEntry],
    output_path: &Path,
    max_entries_per_file: usize,
    base_url: &Url,
    include_lastmod: bool,
) -> Result<WrittenSitemaps, SitemapError> {
    write_sitemaps_at(
        entries,
        output_path,
        max_entries_per_file,
        base_url,
        include_lastmod.then(Utc::now),
    )
}

// Does the actual writing; the index timestamp is passed in so tests can pin it
//
// Parameters:
//   entries: sitemap entries in discovery order
//   output_path: the single sitemap, or the index when chunking
//   max_entries_per_file: chunk size (clamped to at least 1)
//   base_url: what chunk file names are resolved against for the index
//   index_lastmod: timestamp for every index entry, or None to omit it
//
// Returns: the paths that were written
//
// Example (cap = 2, 5 entries, output ./sitemap.xml):
//   sitemap-1.xml (2), sitemap-2.xml (2), sitemap-3.xml (1), sitemap.xml (index)
fn write_sitemaps_at(
    entries: &[SitemapEntry],
    output_path: &Path,
    max_entries_per_file: usize,
    base_url: &Url,
    index_lastmod: Option<DateTime<Utc>>,
) -> Result<WrittenSitemaps, SitemapError> {
    let cap = max_entries_per_file.max(1);

    // Small enough for one file: no index needed
    if entries.len() <= cap {
        write_file(output_path, &build_urlset(entries))?;
        info!(path = %output_path.display(), entries = entries.len(), "sitemap written");
        return Ok(WrittenSitemaps {
            index: None,
            sitemaps: vec![output_path.to_path_buf()],
        });
    }

    // Too many: write contiguous chunks, numbered from 1
    let mut sitemaps = Vec::new();
    let mut locations = Vec::new();
    for (i, chunk) in entries.chunks(cap).enumerate() {
        let path = chunk_path(output_path, i + 1);
        write_file(&path, &build_urlset(chunk))?;
        debug!(path = %path.display(), entries = chunk.len(), "sitemap chunk written");

        // The index points at each chunk by URL, next to the site root
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        locations.push(base_url.join(&file_name)?.to_string());
        sitemaps.push(path);
    }

    // Then the index itself at the requested path
    let lastmod = index_lastmod.map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true));
    write_file(output_path, &build_index(&locations, lastmod.as_deref()))?;
    info!(
        path = %output_path.display(),
        chunks = sitemaps.len(),
        entries = entries.len(),
        "sitemap index written"
    );

    Ok(WrittenSitemaps {
        index: Some(output_path.to_path_buf()),
        sitemaps,
    })
}

/// `dir/sitemap.xml` + 2 -> `dir/sitemap-2.xml`
fn chunk_path(output_path: &Path, number: usize) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sitemap".to_string());
    let name = match output_path.extension() {
        Some(ext) => format!("{stem}-{number}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{number}"),
    };
    output_path.with_file_name(name)
}

// Renders one <urlset> document
//
// Every text node is XML-escaped; <lastmod> comes before <priority>
// and is left out when the entry has none.
fn build_urlset(entries: &[SitemapEntry]) -> String {
    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    let _ = writeln!(xml, r#"<urlset xmlns="{SITEMAP_NS}">"#);
    for entry in entries {
        xml.push_str("  <url>\n");
        let _ = writeln!(xml, "    <loc>{}</loc>", escape(entry.loc.as_str()));
        if let Some(lastmod) = &entry.lastmod {
            let _ = writeln!(xml, "    <lastmod>{}</lastmod>", escape(lastmod.as_str()));
        }
        let _ = writeln!(xml, "    <priority>{}</priority>", format_priority(entry.priority));
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

// Renders the <sitemapindex> document listing every chunk
fn build_index(locations: &[String], lastmod: Option<&str>) -> String {
    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    let _ = writeln!(xml, r#"<sitemapindex xmlns="{SITEMAP_NS}">"#);
    for loc in locations {
        xml.push_str("  <sitemap>\n");
        let _ = writeln!(xml, "    <loc>{}</loc>", escape(loc.as_str()));
        if let Some(lastmod) = lastmod {
            let _ = writeln!(xml, "    <lastmod>{}</lastmod>", escape(lastmod));
        }
        xml.push_str("  </sitemap>\n");
    }
    xml.push_str("</sitemapindex>\n");
    xml
}

// One decimal place, with exact ties rounded up (0.25 -> "0.3")
//
// Plain {:.1} rounds ties to even. Within one decimal the only exact ties
// an f64 can hold are odd multiples of 0.25, and multiplying by 4 is exact.
fn format_priority(priority: f64) -> String {
    let quarters = priority * 4.0;
    if quarters.fract() == 0.0 && quarters % 2.0 != 0.0 {
        return format!("{:.1}", priority + 0.05);
    }
    format!("{:.1}", priority)
}

// Writes a whole file, keeping the path in the error
fn write_file(path: &Path, contents: &str) -> Result<(), SitemapError> {
    fs::write(path, contents).map_err(|source| SitemapError::Io {
        path: path.to_path_buf(),
        source,
    })
}

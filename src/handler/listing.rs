//! Directory listing module
//!
//! Renders a directory as an HTML table: folders first, then files, each group
//! ordered by name.

use chrono::{DateTime, Local};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt::Write as _;
use std::io;
use std::path::Path;
use tokio::fs;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Characters left unescaped in entry links: alphanumerics and `-_.~`
const HREF_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const PAGE_STYLE: &str = r"
body {margin: 0; padding-top: 10px; background-color: #edece4; font-family: Tahoma, Geneva, sans-serif; color: #4d4d4d}
.contents {margin: 0 auto;}
a:link, a:visited, a:active {color: #333333; text-decoration: none;}
table {margin: 0 auto; background-color: #fff; padding: 40px; border: solid 1px #d9d8d4;}
tr:hover {background-color: rgba(243, 243, 243, 0.85);}
td {padding: 3px 20px 3px 0;}
th {text-align: left; border-bottom: 1px solid #4d4d4d;}
.nav {margin: 0 auto 10px; text-align: center;}
.footer {background-color: #fff; border-top: solid 1px #d9d8d4; border-bottom: solid 1px #d9d8d4; padding: 15px 0; margin: 10px 0; text-align: center; font-style: italic;}
.icon {width: 16px; height: 16px; display: inline-block; border-radius: 3px; background-color: #bdbdbd;}
.icons {padding: 2px 2px 2px 0;}
.directory {background-color: #e6a84a;}
.image {background-color: #6fa8dc;}
.audio {background-color: #8e7cc3;}
.video {background-color: #3d3d3d;}
.document {background-color: #9fc5e8;}
.web {background-color: #76a5af;}
.develop {background-color: #93c47d;}
";

/// Maps a lowercased extension (without the dot) to an icon category
pub type CategoryFn = fn(&str) -> &'static str;

/// Icon category used for a file whose extension is unknown
pub const DEFAULT_CATEGORY: &str = "file";

/// Icon category of a file extension
pub fn category_for_extension(extension: &str) -> &'static str {
    match extension {
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "svg" | "webp" | "ico" => "image",
        "mp3" | "wav" | "wma" | "flac" | "ogg" | "m4a" => "audio",
        "mp4" | "mpg" | "mpeg" | "avi" | "mkv" | "mov" | "webm" => "video",
        "pdf" | "doc" | "docx" | "text" | "txt" | "md" | "ppt" | "pptx" | "xml" => "document",
        "html" | "htm" | "css" | "js" => "web",
        "c" | "cpp" | "h" | "java" | "cs" | "go" | "rs" | "sh" | "rb" | "php" | "py" => "develop",
        _ => DEFAULT_CATEGORY,
    }
}

/// One row of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<DateTime<Local>>,
}

/// Listing renderer, shared by all requests
#[derive(Debug, Clone)]
pub struct Listing {
    server_name: String,
    show_hidden: bool,
    category: CategoryFn,
}

impl Listing {
    pub fn new(server_name: String, show_hidden: bool, category: CategoryFn) -> Self {
        Self {
            server_name,
            show_hidden,
            category,
        }
    }

    /// Read the visible entries of `dir`
    ///
    /// Entries whose metadata cannot be read are skipped.
    pub async fn read_entries(&self, dir: &Path) -> io::Result<Vec<ListingEntry>> {
        let mut reader = fs::read_dir(dir).await?;
        let mut entries = Vec::new();

        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !self.show_hidden && name.starts_with('.') {
                continue;
            }
            // follows symlinks, so a link to a folder lists as a folder
            let Ok(metadata) = fs::metadata(entry.path()).await else {
                continue;
            };
            entries.push(ListingEntry {
                name,
                is_dir: metadata.is_dir(),
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Local>::from),
            });
        }

        Ok(entries)
    }

    /// Render the HTML page for `title` (the directory's own name)
    pub fn render(&self, title: &str, mut entries: Vec<ListingEntry>) -> String {
        entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

        let mut html = String::with_capacity(4096 + entries.len() * 256);
        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{PAGE_STYLE}</style>\n</head>\n<body><div class=\"contents\">\n",
            escape_html(title)
        );
        html.push_str("<div class=\"nav\"><a href=\"/\">Home</a> | <a href=\"../\">Up</a></div>\n");
        html.push_str(
            "<table>\n<thead><tr><th></th><th>Name</th><th>Size</th><th>Last Modified</th></tr></thead>\n",
        );

        for entry in &entries {
            self.render_row(&mut html, entry);
        }

        html.push_str("</table>\n</div>\n");
        let _ = write!(
            html,
            "<div class=\"footer\">Powered by {}</div>\n</body>\n</html>\n",
            escape_html(&self.server_name)
        );
        html
    }

    fn render_row(&self, html: &mut String, entry: &ListingEntry) {
        let href = utf8_percent_encode(&entry.name, HREF_ESCAPE).to_string();
        let (icon, href, target, size) = if entry.is_dir {
            ("directory", href + "/", "_self", "-".to_string())
        } else {
            (self.category_of(&entry.name), href, "_blank", format_size(entry.size))
        };
        let modified = entry
            .modified
            .map(|t| t.format(DATE_FORMAT).to_string())
            .unwrap_or_default();

        let _ = write!(
            html,
            "<tr>\n\t<td class=\"icons\"><div class=\"{icon} icon\"></div></td>\n\t<td><a href=\"{href}\" target=\"{target}\">{}</a></td>\n\t<td>{size}</td>\n\t<td>{modified}</td>\n</tr>\n",
            escape_html(&entry.name)
        );
    }

    fn category_of(&self, name: &str) -> &'static str {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map_or(DEFAULT_CATEGORY, |e| (self.category)(&e.to_ascii_lowercase()))
    }
}

/// Human readable size with two decimals: `512.00 B`, `1.50 KB`
#[allow(clippy::cast_precision_loss)]
pub fn format_size(size: u64) -> String {
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", SIZE_UNITS[unit])
}

pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

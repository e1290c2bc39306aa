// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::WikiError;
use crate::feed::Episode;

/// Divider row of the four-column episode table
pub const DEFAULT_SEPARATOR: &str = "---|---|---|---";

/// Longest edit reason the venue accepts, in characters
pub const MAX_REASON_CHARS: usize = 256;

/// Date format of the release column, e.g. `1/2/2024`
pub const RELEASE_DATE_FORMAT: &str = "%-m/%-d/%Y";

/// Build the table row for an episode:
/// `[title](episode url)|release date|description|[Mp3](audio url)`
pub fn table_row(episode: &Episode) -> String {
    let title = normalize_quotes(&episode.title);
    let title_cell = match &episode.episode_url {
        Some(url) => format!("[{title}]({url})"),
        None => title,
    };

    let release = episode
        .release_date
        .map(|date| date.format(RELEASE_DATE_FORMAT).to_string())
        .unwrap_or_default();

    let description: String = episode
        .description
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n'))
        .collect();

    format!(
        "{title_cell}|{release}|{description}|[Mp3]({})",
        episode.audio_url
    )
}

/// Insert `row` as the line directly after the separator line.
///
/// All other lines, including their line endings, are kept byte for byte.
pub fn patch_table(page: &str, separator: &str, row: &str) -> Result<String, WikiError> {
    let lines: Vec<&str> = page.split('\n').collect();

    let index = lines
        .iter()
        .position(|line| line.strip_suffix('\r').unwrap_or(*line) == separator)
        .ok_or_else(|| WikiError::SeparatorNotFound {
            separator: separator.to_string(),
        })?;
    let crlf = lines[index].ends_with('\r');

    let mut patched = String::with_capacity(page.len() + row.len() + 2);
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            patched.push('\n');
        }
        patched.push_str(line);

        if i == index {
            patched.push('\n');
            patched.push_str(row);
            if crlf {
                patched.push('\r');
            }
        }
    }

    Ok(patched)
}

/// Edit reason for a table update: the title, capped at [`MAX_REASON_CHARS`]
pub fn edit_reason(title: &str) -> String {
    title.chars().take(MAX_REASON_CHARS).collect()
}

/// Replace typographic quotes with ASCII ones so link syntax stays intact
fn normalize_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
            other => other,
        })
        .collect()
}

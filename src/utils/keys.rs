use std::path::Path;

/// Strip any directory components (either separator) from a client-supplied
/// filename and replace characters that make awkward object keys.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or("");
    let name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() || name == "." || name == ".." {
        return None;
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';') {
                '_'
            } else {
                c
            }
        })
        .collect();

    Some(sanitized)
}

/// Split a filename into the part before the first dot and the part after
/// the last dot. `heart.v2.csv` gives `("heart", Some("csv"))`.
pub fn split_filename(filename: &str) -> (&str, Option<&str>) {
    match (filename.find('.'), filename.rfind('.')) {
        (Some(first), Some(last)) => {
            let ext = &filename[last + 1..];
            (
                &filename[..first],
                if ext.is_empty() { None } else { Some(ext) },
            )
        }
        _ => (filename, None),
    }
}

/// Key for a staged object: `{prefix}{base}_{timestamp}.{ext}`.
///
/// `ext` overrides the extension taken from `filename`. Without either the
/// key carries no extension.
pub fn stage_key(prefix: &str, filename: &str, timestamp: i64, ext: Option<&str>) -> String {
    let (base, own_ext) = split_filename(filename);
    let base = if base.is_empty() { "unnamed" } else { base };
    match ext.or(own_ext) {
        Some(ext) => format!("{}{}_{}.{}", prefix, base, timestamp, ext),
        None => format!("{}{}_{}", prefix, base, timestamp),
    }
}

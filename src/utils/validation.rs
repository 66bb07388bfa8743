use chrono::Utc;

/// Longest base name kept in a stored filename, in characters.
pub const MAX_BASE_NAME_CHARS: usize = 64;

/// Longest extension kept in a stored filename.
pub const MAX_EXTENSION_CHARS: usize = 10;

pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_CHARS: usize = 50;

/// Formats whose magic bytes only identify the container, not the document.
const CONTAINER_TYPES: &[&str] = &["application/zip", "application/x-ole-storage"];

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Lower-cases a declared content type, drops its parameters and maps the
/// spellings browsers use to their registered names.
pub fn normalize_mime_type(content_type: &str) -> String {
    let essence = content_type
        .parse::<mime::Mime>()
        .map(|m| m.essence_str().to_lowercase())
        .unwrap_or_else(|_| {
            content_type
                .split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_lowercase()
        });

    match essence.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/x-png" => "image/png".to_string(),
        "application/x-pdf" => "application/pdf".to_string(),
        _ => essence,
    }
}

fn is_container_based(mime_type: &str) -> bool {
    mime_type == "application/msword" || mime_type.contains("openxmlformats")
}

/// Decides the MIME type of an upload from its first bytes. The declared
/// type is only used when the bytes carry no signature and the declared type
/// is textual, or to name the document inside a recognised container.
pub fn resolve_mime_type(declared: Option<&str>, header: &[u8]) -> Result<String, ValidationError> {
    let declared = normalize_mime_type(declared.unwrap_or("application/octet-stream"));

    if is_executable_content(header) {
        return Err(ValidationError {
            code: "EXECUTABLE_CONTENT",
            message: "File contains executable content which is not allowed".to_string(),
        });
    }

    match infer::get(header).map(|t| t.mime_type()) {
        Some(sniffed) if CONTAINER_TYPES.contains(&sniffed) && is_container_based(&declared) => {
            Ok(declared)
        }
        Some(sniffed) => {
            if sniffed != declared {
                tracing::debug!(
                    "Declared MIME type '{}' replaced by detected '{}'",
                    declared,
                    sniffed
                );
            }
            Ok(sniffed.to_string())
        }
        None if declared.starts_with("text/") => {
            if header.iter().take(512).any(|&b| b == 0) {
                return Err(ValidationError {
                    code: "BINARY_AS_TEXT",
                    message: "File claimed as text but contains binary content".to_string(),
                });
            }
            Ok(declared)
        }
        None => Err(ValidationError {
            code: "UNRECOGNIZED_CONTENT",
            message: format!(
                "File content does not match any known signature for '{}'",
                declared
            ),
        }),
    }
}

/// Checks if file content appears to be executable
pub fn is_executable_content(header: &[u8]) -> bool {
    if header.len() < 4 {
        return false;
    }

    // ELF binary (Linux)
    if header.starts_with(&[0x7F, 0x45, 0x4C, 0x46]) {
        return true;
    }

    // PE/COFF (Windows .exe, .dll)
    if header.starts_with(&[0x4D, 0x5A]) {
        return true;
    }

    // Mach-O (macOS)
    if header.starts_with(&[0xFE, 0xED, 0xFA, 0xCE])
        || header.starts_with(&[0xFE, 0xED, 0xFA, 0xCF])
        || header.starts_with(&[0xCE, 0xFA, 0xED, 0xFE])
        || header.starts_with(&[0xCF, 0xFA, 0xED, 0xFE])
    {
        return true;
    }

    // Shebang (shell scripts)
    header.starts_with(b"#!")
}

/// Splits a client-supplied filename into a safe base name and an optional
/// lower-cased extension. Directory components are discarded.
pub fn split_original_name(original: &str) -> (String, Option<String>) {
    let name = original.rsplit(['/', '\\']).next().unwrap_or("");

    let (stem, extension) = match name.rfind('.') {
        Some(i) if i > 0 => (&name[..i], Some(&name[i + 1..])),
        _ => (name, None),
    };

    let mut base = String::with_capacity(stem.len());
    for c in stem.chars() {
        let c = if c.is_alphanumeric() || c == '-' { c } else { '_' };
        if c == '_' && base.ends_with('_') {
            continue;
        }
        base.push(c);
    }
    let base: String = base
        .trim_matches(|c| c == '_' || c == '-')
        .chars()
        .take(MAX_BASE_NAME_CHARS)
        .collect();
    let base = if base.is_empty() { "file".to_string() } else { base };

    let extension = extension
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| {
            !e.is_empty()
                && e.len() <= MAX_EXTENSION_CHARS
                && e.chars().all(|c| c.is_ascii_alphanumeric())
        });

    (base, extension)
}

/// Builds `<base>-<micros>-<random>.<ext>`. Two calls never share a name
/// unless both the microsecond clock and 64 random bits coincide.
pub fn generate_stored_name(original: &str) -> String {
    let (base, extension) = split_original_name(original);
    let suffix = format!("{}-{:016x}", Utc::now().timestamp_micros(), rand::random::<u64>());

    match extension {
        Some(ext) => format!("{}-{}.{}", base, suffix, ext),
        None => format!("{}-{}", base, suffix),
    }
}

/// Normalises tag input: every value may itself be a comma separated list.
/// Empty labels are dropped and duplicates collapsed, keeping first-seen order.
pub fn normalize_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags: Vec<String> = Vec::new();
    for value in raw {
        for tag in value.as_ref().split(',') {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }
    }
    tags
}

pub fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > MAX_TAGS {
        return Err(ValidationError {
            code: "TOO_MANY_TAGS",
            message: format!("At most {} tags are allowed", MAX_TAGS),
        });
    }
    if let Some(tag) = tags.iter().find(|t| t.chars().count() > MAX_TAG_CHARS) {
        return Err(ValidationError {
            code: "TAG_TOO_LONG",
            message: format!("Tag '{}' exceeds {} characters", tag, MAX_TAG_CHARS),
        });
    }
    Ok(())
}

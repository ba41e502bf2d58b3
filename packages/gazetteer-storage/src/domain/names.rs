//! Language tags on `name:*` properties
//!
//! Name keys carry an RFC 5646-style tag written with underscores, e.g.
//! `eng_x_preferred` or `zho_hant_tw_x_variant`. The private-use part is the
//! name qualifier (`preferred`, `variant`, `colloquial`, ...).

pub const PREFERRED: &str = "preferred";
pub const VARIANT: &str = "variant";
pub const COLLOQUIAL: &str = "colloquial";

/// Subtags of one name key; absent parts are empty strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageTag {
    pub language: String,
    pub extlang: String,
    pub script: String,
    pub region: String,
    pub variant: String,
    pub extension: String,
    pub privateuse: String,
}

impl LanguageTag {
    /// Split a name tag into subtags
    ///
    /// Parsing is lenient: subtags that fit no slot end up in `variant`.
    pub fn parse(tag: &str) -> Self {
        let normalized = tag.replace('-', "_");

        let (main, privateuse) = match normalized.split_once("_x_") {
            Some((main, private)) => (main, private),
            None => match normalized.strip_prefix("x_") {
                Some(private) => ("", private),
                None => (normalized.as_str(), ""),
            },
        };

        let mut parsed = Self {
            privateuse: privateuse.replace('_', "-"),
            ..Default::default()
        };

        let mut subtags = main.split('_').filter(|s| !s.is_empty());
        parsed.language = subtags.next().unwrap_or_default().to_ascii_lowercase();

        let mut variants: Vec<&str> = Vec::new();
        let mut extension: Vec<&str> = Vec::new();

        for subtag in subtags {
            let alpha = subtag.bytes().all(|b| b.is_ascii_alphabetic());
            let digits = subtag.bytes().all(|b| b.is_ascii_digit());
            let settled = !parsed.script.is_empty() || !parsed.region.is_empty() || !variants.is_empty();

            if !extension.is_empty() || subtag.len() == 1 {
                extension.push(subtag);
            } else if alpha && subtag.len() == 3 && parsed.extlang.is_empty() && !settled {
                parsed.extlang = subtag.to_ascii_lowercase();
            } else if alpha && subtag.len() == 4 && parsed.script.is_empty() && parsed.region.is_empty() && variants.is_empty() {
                parsed.script = subtag.to_ascii_lowercase();
            } else if ((alpha && subtag.len() == 2) || (digits && subtag.len() == 3))
                && parsed.region.is_empty()
                && variants.is_empty()
            {
                parsed.region = subtag.to_ascii_lowercase();
            } else {
                variants.push(subtag);
            }
        }

        parsed.variant = variants.join("-");
        parsed.extension = extension.join("-");
        parsed
    }
}

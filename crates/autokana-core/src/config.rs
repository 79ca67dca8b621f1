use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, warn};

/// Syllabary the reading is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    #[default]
    #[serde(alias = "native")]
    Hiragana,
    #[serde(alias = "transliterated")]
    Katakana,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OptionsUpdate")]
pub struct Options {
    pub script: Script,
    /// Clear the reading when the source field is emptied outside a composition.
    pub clear_on_empty: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            script: Script::Hiragana,
            clear_on_empty: true,
        }
    }
}

impl Options {
    pub fn with_script(mut self, script: Script) -> Self {
        self.script = script;
        self
    }

    pub fn with_clear_on_empty(mut self, clear_on_empty: bool) -> Self {
        self.clear_on_empty = clear_on_empty;
        self
    }

    /// Applies the keys present in `update`; absent keys keep their value.
    pub fn merged(self, update: OptionsUpdate) -> Self {
        let script = update
            .script
            .or(update.katakana.map(|k| {
                if k {
                    Script::Katakana
                } else {
                    Script::Hiragana
                }
            }))
            .unwrap_or(self.script);
        Self {
            script,
            clear_on_empty: update.clear_on_empty.unwrap_or(self.clear_on_empty),
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("invalid autokana options")
    }
}

/// Partial options, also the accepted on-disk shape. `katakana` is the older
/// boolean flag; `script` wins when both are given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OptionsUpdate {
    pub script: Option<Script>,
    pub katakana: Option<bool>,
    #[serde(alias = "clearOnEmpty")]
    pub clear_on_empty: Option<bool>,
}

impl OptionsUpdate {
    pub fn script(script: Script) -> Self {
        Self {
            script: Some(script),
            ..Self::default()
        }
    }

    pub fn clear_on_empty(clear_on_empty: bool) -> Self {
        Self {
            clear_on_empty: Some(clear_on_empty),
            ..Self::default()
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("invalid autokana options update")
    }
}

impl From<OptionsUpdate> for Options {
    fn from(update: OptionsUpdate) -> Self {
        Options::default().merged(update)
    }
}

pub fn load_options<P: AsRef<Path>>(path: P) -> Result<Options> {
    let path = path.as_ref();
    let raw = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let text = decode_text(&raw, path);
    Options::from_json_str(text.as_ref()).with_context(|| format!("in {}", path.display()))
}

/// Picks the encoding of an option file: BOM first, then UTF-8, then Shift_JIS
/// for files saved by older Japanese editors.
fn sniff_encoding(raw: &[u8]) -> (&'static encoding_rs::Encoding, usize) {
    encoding_rs::Encoding::for_bom(raw).unwrap_or_else(|| {
        if std::str::from_utf8(raw).is_ok() {
            (encoding_rs::UTF_8, 0)
        } else {
            (encoding_rs::SHIFT_JIS, 0)
        }
    })
}

fn decode_text<'a>(raw: &'a [u8], origin: &Path) -> Cow<'a, str> {
    let (encoding, bom_len) = sniff_encoding(raw);
    debug!("Reading {} as {}", origin.display(), encoding.name());
    let (text, had_errors) = encoding.decode_without_bom_handling(&raw[bom_len..]);
    if had_errors {
        warn!(
            "{} is not clean {}; replacement characters were used",
            origin.display(),
            encoding.name()
        );
    }
    text
}

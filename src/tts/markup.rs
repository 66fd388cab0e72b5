//! SSML markup builder
//!
//! Renders plain text plus prosody settings into the document handed to the
//! synthesizer.

use crate::error::SpeechError;
use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SSML_NAMESPACE: &str = "http://www.w3.org/2001/10/synthesis";

/// Prosody volume token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Volume {
    Soft,
    #[default]
    Medium,
    Loud,
}

impl Volume {
    pub fn as_str(&self) -> &'static str {
        match self {
            Volume::Soft => "soft",
            Volume::Medium => "medium",
            Volume::Loud => "loud",
        }
    }
}

/// Level used by both the emphasis and the accent wrappers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmphasisLevel {
    #[default]
    None,
    Reduced,
    Moderate,
    Strong,
}

impl EmphasisLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmphasisLevel::None => "none",
            EmphasisLevel::Reduced => "reduced",
            EmphasisLevel::Moderate => "moderate",
            EmphasisLevel::Strong => "strong",
        }
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for EmphasisLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Volume {
    type Err = SpeechError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "soft" => Ok(Volume::Soft),
            "medium" => Ok(Volume::Medium),
            "loud" => Ok(Volume::Loud),
            other => Err(SpeechError::Parse(format!(
                "unknown volume '{other}' (expected soft, medium or loud)"
            ))),
        }
    }
}

impl FromStr for EmphasisLevel {
    type Err = SpeechError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(EmphasisLevel::None),
            "reduced" => Ok(EmphasisLevel::Reduced),
            "moderate" => Ok(EmphasisLevel::Moderate),
            "strong" => Ok(EmphasisLevel::Strong),
            other => Err(SpeechError::Parse(format!(
                "unknown level '{other}' (expected none, reduced, moderate or strong)"
            ))),
        }
    }
}

/// Prosody applied to every synthesis request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisSettings {
    /// Speaking rate offset in percent
    pub rate: i32,
    /// Pitch offset in percent
    pub pitch: i32,
    pub volume: Volume,
    pub emphasis: EmphasisLevel,
    pub accent: EmphasisLevel,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            rate: 0,
            pitch: 0,
            volume: Volume::Medium,
            emphasis: EmphasisLevel::Moderate,
            accent: EmphasisLevel::None,
        }
    }
}

impl fmt::Display for SynthesisSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rate={} pitch={} volume={} emphasis={} accent={}",
            signed_percent(self.rate),
            signed_percent(self.pitch),
            self.volume,
            self.emphasis,
            self.accent
        )
    }
}

/// Render a percentage with an explicit `+` for positive values
pub fn signed_percent(value: i32) -> String {
    if value > 0 {
        format!("+{value}%")
    } else {
        format!("{value}%")
    }
}

/// Build the SSML document for `text`.
///
/// The accent wrapper is always the innermost element and the emphasis wrapper
/// the outermost one. Text and identifiers are XML-escaped.
pub fn build_markup(
    text: &str,
    settings: &SynthesisSettings,
    language: &str,
    voice: &str,
) -> String {
    let mut inner = escape(text).into_owned();
    if settings.accent != EmphasisLevel::None {
        inner = format!(
            r#"<emphasis level="{}">{inner}</emphasis>"#,
            settings.accent
        );
    }
    if settings.emphasis != EmphasisLevel::None {
        inner = format!(
            r#"<emphasis level="{}">{inner}</emphasis>"#,
            settings.emphasis
        );
    }

    format!(
        r#"<speak version="1.0" xmlns="{ns}" xml:lang="{lang}"><voice name="{voice}"><prosody rate="{rate}" pitch="{pitch}" volume="{volume}">{inner}</prosody></voice></speak>"#,
        ns = SSML_NAMESPACE,
        lang = escape(language),
        voice = escape(voice),
        rate = signed_percent(settings.rate),
        pitch = signed_percent(settings.pitch),
        volume = settings.volume,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> SynthesisSettings {
        SynthesisSettings {
            emphasis: EmphasisLevel::None,
            ..SynthesisSettings::default()
        }
    }

    #[test]
    fn test_signed_percent() {
        assert_eq!(signed_percent(20), "+20%");
        assert_eq!(signed_percent(1), "+1%");
        assert_eq!(signed_percent(0), "0%");
        assert_eq!(signed_percent(-15), "-15%");
    }

    #[test]
    fn test_prosody_attributes() {
        let settings = SynthesisSettings {
            rate: 20,
            pitch: -5,
            volume: Volume::Loud,
            ..plain()
        };
        let markup = build_markup("hi", &settings, "ru-RU", "ru-RU-DmitryNeural");
        assert!(markup.contains(r#"<prosody rate="+20%" pitch="-5%" volume="loud">hi</prosody>"#));
        assert!(markup.contains(r#"xml:lang="ru-RU""#));
        assert!(markup.contains(r#"<voice name="ru-RU-DmitryNeural">"#));
        assert!(markup.starts_with("<speak"));
        assert!(markup.ends_with("</speak>"));
    }

    #[test]
    fn test_no_wrappers_when_both_none() {
        let markup = build_markup("plain", &plain(), "en-US", "v");
        assert!(!markup.contains("<emphasis"));
    }

    #[test]
    fn test_accent_is_always_innermost() {
        let levels = [
            EmphasisLevel::None,
            EmphasisLevel::Reduced,
            EmphasisLevel::Moderate,
            EmphasisLevel::Strong,
        ];
        for emphasis in levels {
            for accent in levels {
                if emphasis == EmphasisLevel::None && accent == EmphasisLevel::None {
                    continue;
                }
                let settings = SynthesisSettings {
                    emphasis,
                    accent,
                    ..plain()
                };
                let markup = build_markup("word", &settings, "en-US", "v");
                let (_, body) = markup.split_once(r#"volume="medium">"#).unwrap();

                match (emphasis, accent) {
                    (EmphasisLevel::None, a) => {
                        assert!(body.starts_with(&format!(r#"<emphasis level="{a}">word</emphasis>"#)));
                    }
                    (e, EmphasisLevel::None) => {
                        assert!(body.starts_with(&format!(r#"<emphasis level="{e}">word</emphasis>"#)));
                    }
                    (e, a) => {
                        let expected = format!(
                            r#"<emphasis level="{e}"><emphasis level="{a}">word</emphasis></emphasis>"#
                        );
                        assert!(body.starts_with(&expected), "{markup}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_text_is_escaped() {
        let markup = build_markup(
            r#"a < b & "c" </prosody>"#,
            &plain(),
            "en-US",
            r#"voice"name"#,
        );
        assert!(markup.contains("a &lt; b &amp; &quot;c&quot; &lt;/prosody&gt;"));
        assert!(markup.contains(r#"<voice name="voice&quot;name">"#));
        assert_eq!(markup.matches("</prosody>").count(), 1);
    }

    #[test]
    fn test_parse_levels() {
        assert_eq!("LOUD".parse::<Volume>().unwrap(), Volume::Loud);
        assert_eq!(" strong ".parse::<EmphasisLevel>().unwrap(), EmphasisLevel::Strong);
        assert!("whisper".parse::<Volume>().is_err());
        assert!("extreme".parse::<EmphasisLevel>().is_err());
    }

    #[test]
    fn test_default_settings() {
        let settings = SynthesisSettings::default();
        assert_eq!(settings.rate, 0);
        assert_eq!(settings.pitch, 0);
        assert_eq!(settings.volume, Volume::Medium);
        assert_eq!(settings.emphasis, EmphasisLevel::Moderate);
        assert_eq!(settings.accent, EmphasisLevel::None);
    }
}

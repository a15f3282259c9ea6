//! Language/country tables and user locale resolution.
//!
//! The catalog mirror tags channels with ISO 639-2 language codes, while
//! device locales use ISO 639-1 (`en-US`).  Everything the engine compares
//! goes through [`normalize_lang_code`] first.

use crate::protocol::UserMeta;

/// Category slugs fetched by the catalog, in fetch order.
pub const CATEGORIES: &[&str] = &[
    "animation",
    "auto",
    "business",
    "classic",
    "comedy",
    "cooking",
    "culture",
    "documentary",
    "education",
    "entertainment",
    "family",
    "general",
    "kids",
    "legislative",
    "lifestyle",
    "movies",
    "music",
    "news",
    "outdoor",
    "public",
    "relax",
    "religious",
    "science",
    "series",
    "shop",
    "show",
    "sports",
    "top-news",
    "travel",
    "weather",
];

/// Locale used when settings are unavailable and no hint was supplied.
pub const DEFAULT_LOCALE: &str = "spa-PE";
const DEFAULT_COUNTRY: &str = "PE";

/// Locale assumed when settings exist but report no UI locale.
const SETTINGS_DEFAULT_LOCALE: &str = "en-US";
const SETTINGS_DEFAULT_COUNTRY: &str = "US";

// ISO 639-1 → ISO 639-2 (bibliographic) as used by the mirror.
const LANG_CODES: &[(&str, &str)] = &[
    ("aa", "aar"), ("ab", "abk"), ("af", "afr"), ("ak", "aka"), ("sq", "alb"),
    ("am", "amh"), ("ar", "ara"), ("an", "arg"), ("hy", "arm"), ("as", "asm"),
    ("av", "ava"), ("ae", "ave"), ("ay", "aym"), ("az", "aze"), ("ba", "bak"),
    ("bm", "bam"), ("be", "bel"), ("bn", "ben"), ("bh", "bih"), ("bi", "bis"),
    ("bo", "tib"), ("bs", "bos"), ("br", "bre"), ("bg", "bul"), ("ca", "cat"),
    ("cs", "cze"), ("ch", "cha"), ("ce", "che"), ("zh", "chi"), ("cu", "chu"),
    ("cv", "chv"), ("kw", "cor"), ("co", "cos"), ("cr", "cre"), ("cy", "wel"),
    ("da", "dan"), ("de", "ger"), ("dv", "div"), ("nl", "dut"), ("dz", "dzo"),
    ("el", "gre"), ("en", "eng"), ("eo", "epo"), ("et", "est"), ("eu", "baq"),
    ("ee", "ewe"), ("fo", "fao"), ("fa", "per"), ("fj", "fij"), ("fi", "fin"),
    ("fr", "fre"), ("fy", "fry"), ("ff", "ful"), ("ka", "geo"), ("gd", "gla"),
    ("ga", "gle"), ("gl", "glg"), ("gv", "glv"), ("gn", "grn"), ("gu", "guj"),
    ("ht", "hat"), ("ha", "hau"), ("he", "heb"), ("hz", "her"), ("hi", "hin"),
    ("ho", "hmo"), ("hr", "hrv"), ("hu", "hun"), ("ig", "ibo"), ("is", "ice"),
    ("io", "ido"), ("ii", "iii"), ("iu", "iku"), ("ie", "ile"), ("ia", "ina"),
    ("id", "ind"), ("ik", "ipk"), ("it", "ita"), ("jv", "jav"), ("ja", "jpn"),
    ("kl", "kal"), ("kn", "kan"), ("ks", "kas"), ("kr", "kau"), ("kk", "kaz"),
    ("km", "khm"), ("ki", "kik"), ("rw", "kin"), ("ky", "kir"), ("kv", "kom"),
    ("kg", "kon"), ("ko", "kor"), ("kj", "kua"), ("ku", "kur"), ("lo", "lao"),
    ("la", "lat"), ("lv", "lav"), ("li", "lim"), ("ln", "lin"), ("lt", "lit"),
    ("lb", "ltz"), ("lu", "lub"), ("lg", "lug"), ("mk", "mac"), ("mh", "mah"),
    ("ml", "mal"), ("mi", "mao"), ("mr", "mar"), ("ms", "may"), ("mg", "mlg"),
    ("mt", "mlt"), ("mn", "mon"), ("my", "bur"), ("na", "nau"), ("nv", "nav"),
    ("nr", "nbl"), ("nd", "nde"), ("ng", "ndo"), ("ne", "nep"), ("nn", "nno"),
    ("nb", "nob"), ("no", "nor"), ("ny", "nya"), ("oc", "oci"), ("oj", "oji"),
    ("or", "ori"), ("om", "orm"), ("os", "oss"), ("pa", "pan"), ("pi", "pli"),
    ("pl", "pol"), ("pt", "por"), ("ps", "pus"), ("qu", "que"), ("rm", "roh"),
    ("ro", "rum"), ("rn", "run"), ("ru", "rus"), ("sg", "sag"), ("sa", "san"),
    ("si", "sin"), ("sk", "slo"), ("sl", "slv"), ("se", "sme"), ("sm", "smo"),
    ("sn", "sna"), ("sd", "snd"), ("so", "som"), ("st", "sot"), ("es", "spa"),
    ("sc", "srd"), ("sr", "srp"), ("ss", "ssw"), ("su", "sun"), ("sw", "swa"),
    ("sv", "swe"), ("ty", "tah"), ("ta", "tam"), ("tt", "tat"), ("te", "tel"),
    ("tg", "tgk"), ("tl", "tgl"), ("th", "tha"), ("ti", "tir"), ("to", "ton"),
    ("tn", "tsn"), ("ts", "tso"), ("tk", "tuk"), ("tr", "tur"), ("tw", "twi"),
    ("ug", "uig"), ("uk", "ukr"), ("ur", "urd"), ("uz", "uzb"), ("ve", "ven"),
    ("vi", "vie"), ("vo", "vol"), ("wa", "wln"), ("wo", "wol"), ("xh", "xho"),
    ("yi", "yid"), ("yo", "yor"), ("za", "zha"), ("zu", "zul"),
];

/// Map an ISO 639-1 code to the mirror's 3-letter code.  Unknown codes
/// (including ones that are already 3 letters) come back lowercased.
pub fn normalize_lang_code(code: &str) -> String {
    let lower = code.to_lowercase();
    LANG_CODES
        .iter()
        .find(|(short, _)| *short == lower)
        .map(|(_, long)| (*long).to_string())
        .unwrap_or(lower)
}

/// Countries that broadcast in `lang_code`, in fixed preference order.
/// The user's own country is still in here; callers exclude it.
pub fn countries_by_lang(lang_code: &str) -> &'static [&'static str] {
    match lang_code {
        "spa" => &[
            "MX", "CO", "ES", "AR", "PE", "VE", "CL", "GT", "EC", "BO", "CU", "DO", "HN", "PY",
            "SV", "NI", "CR", "PA", "UY", "GQ", "PR",
        ],
        "eng" => &["AU", "CA", "IE", "NZ", "UK", "US"],
        // Normalization yields the bibliographic codes (fre, chi); accept both forms
        "fra" | "fre" => &["BE", "CA", "FR", "CH"],
        "ger" => &["AT", "DE", "CH"],
        "por" => &["AO", "BR", "CV", "GW", "MZ", "PT", "ST", "TL"],
        "kor" => &["KR"],
        "jpn" => &["JP"],
        "ara" => &[
            "DZ", "BH", "EG", "IQ", "JO", "KW", "LB", "LY", "MA", "OM", "PS", "QA", "SA", "SD",
            "SY", "TN", "AE", "YE",
        ],
        "zho" | "chi" => &["CN", "HK", "MO", "SG", "TW"],
        _ => &[],
    }
}

/// `top-news` → `Top-news`
pub fn category_display_name(slug: &str) -> String {
    let mut chars = slug.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Platform settings service: what the device reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemSettings {
    pub ui_locale: Option<String>,
    pub country_code: Option<String>,
}

impl SystemSettings {
    /// Read locale settings from the process environment.  Returns `None`
    /// when the environment says nothing at all.
    pub fn from_env() -> Option<Self> {
        let ui_locale = ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .map(|raw| strip_encoding(&raw))
            .find(|l| !l.is_empty() && l != "C" && l != "POSIX");
        let country_code = std::env::var("TV_COUNTRY")
            .ok()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        if ui_locale.is_none() && country_code.is_none() {
            return None;
        }
        Some(Self {
            ui_locale,
            country_code,
        })
    }
}

// `en_US.UTF-8@euro` → `en_US`
fn strip_encoding(raw: &str) -> String {
    raw.split(['.', '@']).next().unwrap_or_default().trim().to_string()
}

fn split_locale(locale: &str) -> (&str, Option<&str>) {
    let mut parts = locale.split(['_', '-']);
    let lang = parts.next().unwrap_or_default();
    let region = parts.next().filter(|r| !r.is_empty());
    (lang, region)
}

/// Resolve the viewer's country and language.
///
/// Settings win when available; otherwise the supplied locale hint is
/// used, and failing that a hardcoded default.
pub fn resolve_user_meta(settings: Option<&SystemSettings>, hint: Option<&str>) -> UserMeta {
    let hint = hint.map(str::trim).filter(|h| !h.is_empty());

    match settings {
        Some(settings) => {
            let locale = settings
                .ui_locale
                .as_deref()
                .filter(|l| !l.is_empty())
                .or(hint)
                .unwrap_or(SETTINGS_DEFAULT_LOCALE);
            let (lang, region) = split_locale(locale);
            let country = settings
                .country_code
                .as_deref()
                .filter(|c| !c.is_empty())
                .or(region)
                .unwrap_or(SETTINGS_DEFAULT_COUNTRY);
            UserMeta {
                country_code: country.to_uppercase(),
                lang_code: normalize_lang_code(lang),
            }
        }
        None => {
            let (lang, region) = split_locale(hint.unwrap_or(DEFAULT_LOCALE));
            UserMeta {
                country_code: region.unwrap_or(DEFAULT_COUNTRY).to_uppercase(),
                lang_code: normalize_lang_code(lang),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lang_code() {
        assert_eq!(normalize_lang_code("en"), "eng");
        assert_eq!(normalize_lang_code("ES"), "spa");
        assert_eq!(normalize_lang_code("de"), "ger");
        // Already normalized / unknown codes pass through lowercased
        assert_eq!(normalize_lang_code("SPA"), "spa");
        assert_eq!(normalize_lang_code("xx"), "xx");
    }

    #[test]
    fn test_neighbor_tables() {
        assert_eq!(countries_by_lang("eng"), &["AU", "CA", "IE", "NZ", "UK", "US"]);
        assert!(countries_by_lang("spa").contains(&"PE"));
        assert!(countries_by_lang("tlh").is_empty());
        assert_eq!(countries_by_lang(&normalize_lang_code("fr")), countries_by_lang("fra"));
        assert_eq!(CATEGORIES.len(), 30);
    }

    #[test]
    fn test_category_display_name() {
        assert_eq!(category_display_name("movies"), "Movies");
        assert_eq!(category_display_name("top-news"), "Top-news");
        assert_eq!(category_display_name(""), "");
    }

    #[test]
    fn test_resolve_without_settings() {
        let meta = resolve_user_meta(None, Some("en-GB"));
        assert_eq!(meta.country_code, "GB");
        assert_eq!(meta.lang_code, "eng");

        let meta = resolve_user_meta(None, None);
        assert_eq!(meta.country_code, "PE");
        assert_eq!(meta.lang_code, "spa");

        // Language-only hint falls back to the default country
        let meta = resolve_user_meta(None, Some("fr"));
        assert_eq!(meta.country_code, "PE");
        assert_eq!(meta.lang_code, "fre");
    }

    #[test]
    fn test_resolve_with_settings() {
        let settings = SystemSettings {
            ui_locale: Some("de_AT".into()),
            country_code: Some("ch".into()),
        };
        let meta = resolve_user_meta(Some(&settings), Some("es-MX"));
        assert_eq!(meta.country_code, "CH");
        assert_eq!(meta.lang_code, "ger");

        let settings = SystemSettings::default();
        let meta = resolve_user_meta(Some(&settings), Some("es-MX"));
        assert_eq!(meta.country_code, "MX");
        assert_eq!(meta.lang_code, "spa");

        let meta = resolve_user_meta(Some(&settings), None);
        assert_eq!(meta.country_code, "US");
        assert_eq!(meta.lang_code, "eng");
    }

    #[test]
    fn test_strip_encoding() {
        assert_eq!(strip_encoding("en_US.UTF-8"), "en_US");
        assert_eq!(strip_encoding("de_DE@euro"), "de_DE");
        assert_eq!(strip_encoding("C"), "C");
    }
}

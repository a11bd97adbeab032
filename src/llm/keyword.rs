//! Offline keyword model
//!
//! Deterministic intent routing used when no hosted backend is configured.
//! One tool call per turn, then the last observation becomes the answer.

use super::{LanguageModel, ThinkRequest};
use crate::models::Decision;
use crate::Result;
use async_trait::async_trait;
use serde_json::json;

pub struct KeywordModel;

const CATEGORY_KEYWORDS: &[&str] = &[
    "makanan", "minuman", "kuliner", "food", "fashion", "jasa", "services", "kerajinan", "crafts",
];

/// Words that end a business-type phrase following "usaha"
const PHRASE_STOPS: &[&str] = &[
    "di", "yang", "dan", "untuk", "cocok", "cocoknya", "bantu", "tolong", "dengan", "saya", "apa",
];

const FALLBACK_BUSINESS: &str = "umum";

#[async_trait]
impl LanguageModel for KeywordModel {
    async fn complete(&self, request: ThinkRequest<'_>) -> Result<Decision> {
        if let Some(last) = request.scratchpad.last() {
            let answer = if last.succeeded() {
                last.observation.clone()
            } else {
                format!(
                    "Maaf, saya belum bisa memproses permintaan itu: {}",
                    last.observation
                )
            };
            return Ok(Decision::final_answer(answer));
        }

        Ok(route(request.input))
    }
}

/// Pick a tool from keywords in the user's message
fn route(input: &str) -> Decision {
    let text = input.trim();
    let lowered = text.to_lowercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));

    if text.is_empty() {
        return Decision::final_answer(
            "Halo! Saya INA, asisten UMKM. Ceritakan usaha Anda atau tanyakan soal SWOT, keuangan, platform digital, perizinan, dan pendanaan.",
        );
    }

    if has_any(&["swot"]) {
        let usaha_type = business_phrase(&lowered).unwrap_or_else(|| FALLBACK_BUSINESS.to_string());
        return Decision::use_tool(
            "analisis_swot",
            json!({ "usaha_type": usaha_type }),
            "Pengguna meminta analisis SWOT",
        );
    }

    if has_any(&["modal", "margin", "proyeksi", "roi", "break even"]) {
        return match (amount_after(&lowered, "modal"), percent(&lowered)) {
            (Some(modal), Some(margin)) => Decision::use_tool(
                "kalkulator_keuangan",
                json!({ "modal": modal, "margin_percent": margin }),
                "Pengguna meminta proyeksi keuangan",
            ),
            _ => Decision::final_answer(
                "Sebutkan modal dan margin keuntungan Anda, misalnya: modal 20 juta, margin 25%.",
            ),
        };
    }

    if has_any(&["platform", "marketplace", "jualan online", "jual online"]) {
        let category = CATEGORY_KEYWORDS
            .iter()
            .find(|k| lowered.contains(*k))
            .map(|k| k.to_string())
            .or_else(|| business_phrase(&lowered))
            .unwrap_or_else(|| FALLBACK_BUSINESS.to_string());
        return Decision::use_tool(
            "rekomendasi_platform",
            json!({ "business_category": category }),
            "Pengguna menanyakan platform digital",
        );
    }

    Decision::use_tool(
        "cari_pengetahuan",
        json!({ "query": text }),
        "Cari panduan di basis pengetahuan",
    )
}

/// Words after "usaha" up to punctuation or a stop word, at most three
fn business_phrase(lowered: &str) -> Option<String> {
    let start = lowered.find("usaha")? + "usaha".len();
    let rest = &lowered[start..];
    let clause = rest
        .split(|c: char| matches!(c, ',' | '.' | '?' | '!' | ';' | ':'))
        .next()
        .unwrap_or_default();

    let words: Vec<&str> = clause
        .split_whitespace()
        .take_while(|w| !PHRASE_STOPS.contains(w))
        .take(3)
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// A number found in text with its byte span
#[derive(Debug, Clone, Copy, PartialEq)]
struct Number {
    start: usize,
    end: usize,
    value: f64,
}

fn numbers(text: &str) -> Vec<Number> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len()
            && (bytes[i].is_ascii_digit()
                || ((bytes[i] == b'.' || bytes[i] == b',')
                    && bytes.get(i + 1).map_or(false, u8::is_ascii_digit)))
        {
            i += 1;
        }
        if let Some(value) = parse_number(&text[start..i]) {
            found.push(Number { start, end: i, value });
        }
    }

    found
}

/// `10.000.000` uses thousands separators; `2,5` or `2.5` is a decimal
fn parse_number(raw: &str) -> Option<f64> {
    let groups: Vec<&str> = raw.split(|c| c == '.' || c == ',').collect();
    let thousands = groups.len() > 1 && groups[1..].iter().all(|g| g.len() == 3);

    if thousands {
        groups.concat().parse().ok()
    } else {
        raw.replace(',', ".").parse().ok()
    }
}

fn multiplier(after: &str) -> f64 {
    let word = after
        .trim_start()
        .split(|c: char| !c.is_alphabetic())
        .next()
        .unwrap_or_default();
    match word {
        "juta" | "jt" => 1_000_000.0,
        "ribu" | "rb" => 1_000.0,
        "miliar" | "milyar" => 1_000_000_000.0,
        _ => 1.0,
    }
}

/// First amount after `keyword`, scaled by a trailing `juta`/`ribu`/`miliar`
fn amount_after(lowered: &str, keyword: &str) -> Option<f64> {
    let from = lowered.find(keyword)?;
    numbers(lowered)
        .into_iter()
        .filter(|n| n.start > from)
        .find(|n| !lowered[n.end..].trim_start().starts_with('%'))
        .map(|n| n.value * multiplier(&lowered[n.end..]))
}

/// Number written before `%`, else the first number after "margin"
fn percent(lowered: &str) -> Option<f64> {
    let all = numbers(lowered);
    all.iter()
        .find(|n| lowered[n.end..].trim_start().starts_with('%'))
        .map(|n| n.value)
        .or_else(|| {
            let from = lowered.find("margin")?;
            all.iter().find(|n| n.start > from).map(|n| n.value)
        })
}

//! Simple financial projection for a small business

use super::Tool;
use crate::error::AdvisorError;
use crate::models::ToolInput;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub struct FinanceCalculatorTool;

/// Computed projection. `roi_percent` is taken from the margin directly,
/// since `profit / modal * 100` reduces to it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FinanceProjection {
    pub modal: f64,
    pub margin_percent: f64,
    pub profit: f64,
    pub roi_percent: f64,
    pub breakeven_months: f64,
}

impl FinanceProjection {
    pub fn compute(modal: f64, margin_percent: f64) -> Result<Self> {
        if !modal.is_finite() || modal <= 0.0 {
            return Err(AdvisorError::InvalidInput(format!(
                "modal must be greater than 0, got {}",
                modal
            )));
        }
        if !margin_percent.is_finite() || margin_percent <= 0.0 {
            return Err(AdvisorError::InvalidInput(format!(
                "margin_percent must be greater than 0, got {}",
                margin_percent
            )));
        }

        // roi = profit / modal * 100 = margin
        Ok(Self {
            modal,
            margin_percent,
            profit: modal * (margin_percent / 100.0),
            roi_percent: margin_percent,
            breakeven_months: 12.0 / margin_percent,
        })
    }

    pub fn report(&self) -> String {
        format!(
            "Hasil Perhitungan:
Modal: {}
Margin: {}%
Keuntungan/bulan: {}
ROI: {}%
Break Even: {:.2} bulan
",
            format_rupiah(self.modal),
            format_plain(self.margin_percent),
            format_rupiah(self.profit),
            format_plain(self.roi_percent),
            self.breakeven_months
        )
    }
}

/// `Rp 20,000,000` style, rounded to whole rupiah
pub fn format_rupiah(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("-Rp {}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}

/// Whole numbers without decimals, others trimmed to at most two places
fn format_plain(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        let s = format!("{:.2}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Read a numeric field that may arrive as a number or a numeric string
fn number_field(params: &Value, keys: &[&str]) -> Result<f64> {
    let value = keys
        .iter()
        .find_map(|key| params.get(*key))
        .ok_or_else(|| AdvisorError::InvalidInput(format!("missing '{}'", keys[0])))?;

    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| AdvisorError::InvalidInput(format!("'{}' is not a number", keys[0]))),
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .map_err(|_| AdvisorError::InvalidInput(format!("'{}' is not a number: {}", keys[0], s))),
        _ => Err(AdvisorError::InvalidInput(format!(
            "'{}' is not a number",
            keys[0]
        ))),
    }
}

#[async_trait::async_trait]
impl Tool for FinanceCalculatorTool {
    fn name(&self) -> &'static str {
        "kalkulator_keuangan"
    }

    fn description(&self) -> &'static str {
        "Kalkulator keuangan UMKM: proyeksi keuntungan, ROI dan break even dari modal dan margin"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "modal": { "type": "number", "description": "Modal awal dalam rupiah" },
                "margin_percent": { "type": "number", "description": "Margin keuntungan dalam persen" }
            },
            "required": ["modal", "margin_percent"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<String> {
        if !input.parameters.is_object() {
            return Err(AdvisorError::InvalidInput(
                "kalkulator_keuangan expects an object {\"modal\": number, \"margin_percent\": number}"
                    .to_string(),
            ));
        }

        let modal = number_field(&input.parameters, &["modal", "capital"])?;
        let margin = number_field(&input.parameters, &["margin_percent", "margin"])?;

        Ok(FinanceProjection::compute(modal, margin)?.report())
    }
}

//! User-facing message catalogue (English and Vietnamese).

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Vi,
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "en-us" | "english" => Ok(Self::En),
            "vi" | "vi-vn" | "vietnamese" => Ok(Self::Vi),
            other => Err(format!("unsupported locale: {other}")),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::En => "en",
            Self::Vi => "vi",
        })
    }
}

pub(crate) fn validation_message(err: &ValidationError, locale: Locale) -> String {
    if locale == Locale::En {
        return err.to_string();
    }
    match err {
        ValidationError::EmptyDataset { label } => format!("{label}: Dữ liệu trống"),
        ValidationError::RaggedRows {
            label,
            row,
            expected,
            found,
        } => format!("{label}: Dòng {row} có {found} giá trị, cần {expected}"),
        ValidationError::InsufficientVariables {
            label,
            required,
            found,
        } => format!("{label}: Cần ít nhất {required} biến (hiện có {found})"),
        ValidationError::InsufficientObservations {
            label,
            required,
            found,
        } => format!("{label}: Cần ít nhất {required} quan sát hợp lệ (hiện có {found})"),
        ValidationError::NonFiniteValue { label, column, row } => {
            format!("{label}: Biến {column} chứa giá trị không hợp lệ tại dòng {row}")
        }
        ValidationError::ZeroVarianceColumn { label, column } => {
            format!("{label}: Biến {column} có phương sai bằng 0 (giá trị hằng số)")
        }
        ValidationError::LengthMismatch {
            label,
            left,
            left_len,
            right,
            right_len,
        } => format!(
            "{label}: {left} có {left_len} giá trị nhưng {right} có {right_len} giá trị"
        ),
        ValidationError::InvalidParameter {
            label,
            name,
            reason,
        } => format!("{label}: Tham số {name} không hợp lệ: {reason}"),
    }
}

/// Friendlier wording for well-known R failure messages. Presentation only: callers
/// still receive the raw runtime text in the error itself.
pub fn runtime_hint(message: &str, locale: Locale) -> Option<&'static str> {
    const HINTS: &[(&[&str], &str, &str)] = &[
        (
            &["singular"],
            "Singular matrix: check for perfect multicollinearity or constant variables.",
            "Ma trận đặc dị: có đa cộng tuyến hoàn hảo hoặc biến hằng số.",
        ),
        (
            &["missing value", "NA/NaN"],
            "The data contains missing values; clean the selected columns and retry.",
            "Dữ liệu chứa giá trị trống (NA); hãy làm sạch dữ liệu rồi thử lại.",
        ),
        (
            &["model is not identified"],
            "The model is not identified: each factor needs at least 3 indicators.",
            "Mô hình không xác định: mỗi nhân tố cần ít nhất 3 biến quan sát.",
        ),
        (
            &["could not find function"],
            "An analysis package is not loaded yet; retry in a few seconds.",
            "Gói phân tích chưa tải xong; vui lòng thử lại sau vài giây.",
        ),
        (
            &["not positive definite"],
            "The covariance matrix is not positive definite: check collinearity or sample size.",
            "Ma trận hiệp phương sai không xác định dương: kiểm tra đa cộng tuyến hoặc cỡ mẫu.",
        ),
        (
            &["subscript out of bounds"],
            "A selected variable was not found; check the column names.",
            "Không tìm thấy dữ liệu biến; kiểm tra tên cột.",
        ),
    ];

    HINTS
        .iter()
        .find(|(needles, _, _)| needles.iter().any(|n| message.contains(n)))
        .map(|(_, en, vi)| match locale {
            Locale::En => *en,
            Locale::Vi => *vi,
        })
}

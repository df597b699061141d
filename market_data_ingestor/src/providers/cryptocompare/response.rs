use serde::Deserialize;

/// Envelope returned by every CryptoCompare endpoint, successful or not.
#[derive(Deserialize, Debug)]
pub struct HistoResponse {
    #[serde(rename = "Response")]
    pub response: String,
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "Type", default)]
    pub response_type: i32,
    /// `{}` on errors, hence every inner field defaults.
    #[serde(rename = "Data", default)]
    pub data: HistoData,
}

#[derive(Deserialize, Debug, Default)]
pub struct HistoData {
    #[serde(rename = "TimeFrom", default)]
    pub time_from: i64,
    #[serde(rename = "TimeTo", default)]
    pub time_to: i64,
    #[serde(rename = "Data", default)]
    pub candles: Vec<HistoCandle>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct HistoCandle {
    /// Candle open time, unix seconds.
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(rename = "volumefrom", default)]
    pub volume_from: f64,
}

impl HistoResponse {
    pub fn is_success(&self) -> bool {
        self.response == "Success"
    }

    /// Type 99 is CryptoCompare's "you are over your rate limit" marker.
    pub fn is_rate_limited(&self) -> bool {
        self.response_type == 99 || self.message.to_lowercase().contains("rate limit")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_with_empty_data_parses() {
        let body = r#"{"Response":"Error","Message":"fsym param is invalid","HasWarning":false,"Type":2,"RateLimit":{},"Data":{}}"#;
        let resp: HistoResponse = serde_json::from_str(body).unwrap();
        assert!(!resp.is_success());
        assert!(!resp.is_rate_limited());
        assert!(resp.data.candles.is_empty());
    }

    #[test]
    fn rate_limit_envelope_is_recognised() {
        let body = r#"{"Response":"Error","Message":"You are over your rate limit please upgrade your account!","Type":99,"Data":{}}"#;
        let resp: HistoResponse = serde_json::from_str(body).unwrap();
        assert!(resp.is_rate_limited());
    }
}

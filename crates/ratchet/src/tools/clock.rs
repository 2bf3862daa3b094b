use std::future::ready;
use std::time::{SystemTime, UNIX_EPOCH};

use ratchet_core::tool::{Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize, JsonSchema)]
pub struct ClockParameters {}

/// A tool that reports the current date and time in UTC.
pub struct ClockTool {
    parameter_schema: Value,
}

impl ClockTool {
    /// Creates a new clock tool.
    #[inline]
    pub fn new() -> Self {
        ClockTool {
            parameter_schema: schema_for!(ClockParameters).to_value(),
        }
    }
}

impl Default for ClockTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for ClockTool {
    type Input = ClockParameters;

    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Returns the current date and time in UTC."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn side_effect_free(&self) -> bool {
        true
    }

    fn execute(
        &self,
        _input: ClockParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        ready(Ok(format_utc(secs)))
    }
}

fn format_utc(epoch_secs: u64) -> String {
    let days = epoch_secs / 86_400;
    let rem = epoch_secs % 86_400;
    let (year, month, day) = civil_from_days(days as i64);
    format!(
        "{year:04}-{month:02}-{day:02} {:02}:{:02}:{:02} UTC",
        rem / 3600,
        rem % 3600 / 60,
        rem % 60
    )
}

/// Converts days since the Unix epoch to a proleptic Gregorian date.
fn civil_from_days(days: i64) -> (i64, u64, u64) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let year = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    (if month <= 2 { year + 1 } else { year }, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_formatting() {
        assert_eq!(format_utc(0), "1970-01-01 00:00:00 UTC");
        // 2000-03-01 is right after a leap day.
        assert_eq!(format_utc(951_868_800), "2000-03-01 00:00:00 UTC");
        assert_eq!(format_utc(1_700_000_000), "2023-11-14 22:13:20 UTC");
    }
}

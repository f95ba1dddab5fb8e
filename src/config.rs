//! Configuration for Pawdium
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;

/// Pawdium - daily pet-photo competition engine
#[derive(Parser, Debug, Clone)]
#[command(name = "pawdium")]
#[command(about = "Daily pet-photo competition engine")]
pub struct Args {
    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "pawdium")]
    pub mongodb_db: String,

    /// Default entry fee in tokens for newly created competitions
    #[arg(long, env = "ENTRY_FEE", default_value = "10")]
    pub entry_fee: i64,

    /// Prior votes per device fingerprint (or IP) in one competition
    /// before new votes are flagged for review
    #[arg(long, env = "FRAUD_VOTE_THRESHOLD", default_value = "5")]
    pub fraud_vote_threshold: u64,

    /// Hour of the nightly tick (local wall clock, 0-23)
    #[arg(long, env = "NIGHTLY_HOUR", default_value = "23")]
    pub nightly_hour: u32,

    /// Minute of the nightly tick (0-59)
    #[arg(long, env = "NIGHTLY_MINUTE", default_value = "59")]
    pub nightly_minute: u32,

    /// Deployment timezone as an offset from UTC in minutes
    #[arg(long, env = "UTC_OFFSET_MINUTES", default_value = "0")]
    pub utc_offset_minutes: i32,

    /// Interval of the status-transition tick in seconds
    #[arg(long, env = "STATUS_INTERVAL_SECS", default_value = "3600")]
    pub status_interval_secs: u64,

    /// Enable development mode (falls back to in-memory storage when
    /// MongoDB is unreachable)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.entry_fee < 0 {
            return Err("ENTRY_FEE must be >= 0".to_string());
        }

        if self.nightly_hour > 23 {
            return Err("NIGHTLY_HOUR must be in 0-23".to_string());
        }

        if self.nightly_minute > 59 {
            return Err("NIGHTLY_MINUTE must be in 0-59".to_string());
        }

        // Offsets beyond a day are certainly a misconfiguration
        if self.utc_offset_minutes.abs() > 14 * 60 {
            return Err("UTC_OFFSET_MINUTES must be within +/-840".to_string());
        }

        if self.status_interval_secs == 0 {
            return Err("STATUS_INTERVAL_SECS must be > 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["pawdium"])
    }

    #[test]
    fn test_defaults_are_valid() {
        let args = base_args();
        assert!(args.validate().is_ok());
        assert_eq!(args.entry_fee, 10);
        assert_eq!(args.nightly_hour, 23);
        assert_eq!(args.nightly_minute, 59);
    }

    #[test]
    fn test_rejects_bad_nightly_time() {
        let mut args = base_args();
        args.nightly_hour = 24;
        assert!(args.validate().is_err());

        let mut args = base_args();
        args.nightly_minute = 60;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_entry_fee() {
        let mut args = base_args();
        args.entry_fee = -1;
        assert!(args.validate().is_err());
    }
}

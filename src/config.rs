use std::time::Duration;
use url::Url;

/// Gateway timeouts outside this range are rejected at startup.
pub const MIN_PAYMENT_TIMEOUT_SECS: u64 = 10;
pub const MAX_PAYMENT_TIMEOUT_SECS: u64 = 30;

/// Payment strategy selected through `PAYMENT_STRATEGY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMode {
    /// Applicant pays a merchant till and self-reports completion.
    Manual {
        till_number: String,
        merchant_name: String,
    },
    /// A push request is sent to an external payment-initiation endpoint.
    RemotePush { endpoint: Url, timeout: Duration },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub payment_mode: PaymentMode,
    /// Idle time after which a session's stored profile is dropped.
    pub session_ttl: Duration,
    /// Simulated latency of the eligibility check.
    pub eligibility_check_delay: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let strategy = std::env::var("PAYMENT_STRATEGY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "manual".to_string());

        let payment_mode = match strategy.trim().to_lowercase().as_str() {
            "manual" => PaymentMode::Manual {
                till_number: std::env::var("TILL_NUMBER")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| "4019420".to_string()),
                merchant_name: std::env::var("TILL_MERCHANT_NAME")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| "Inuka Ventures".to_string()),
            },
            "remote_push" => PaymentMode::RemotePush {
                endpoint: std::env::var("PAYMENT_ENDPOINT")
                    .map_err(|_| {
                        anyhow::anyhow!(
                            "PAYMENT_ENDPOINT environment variable required for remote_push"
                        )
                    })
                    .and_then(|raw| parse_endpoint(&raw))?,
                timeout: std::env::var("PAYMENT_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse::<u64>()
                    .map_err(|_| anyhow::anyhow!("PAYMENT_TIMEOUT_SECS must be a number"))
                    .and_then(payment_timeout)?,
            },
            other => anyhow::bail!(
                "PAYMENT_STRATEGY must be 'manual' or 'remote_push', got '{}'",
                other
            ),
        };

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            payment_mode,
            session_ttl: Duration::from_secs(
                std::env::var("SESSION_TTL_SECS")
                    .unwrap_or_else(|_| "1800".to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("SESSION_TTL_SECS must be a number"))?,
            ),
            eligibility_check_delay: Duration::from_millis(
                std::env::var("ELIGIBILITY_CHECK_DELAY_MS")
                    .unwrap_or_else(|_| "2500".to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("ELIGIBILITY_CHECK_DELAY_MS must be a number"))?,
            ),
        };

        match &config.payment_mode {
            PaymentMode::Manual { till_number, .. } => {
                tracing::info!("Payment strategy: manual till {}", till_number);
            }
            PaymentMode::RemotePush { endpoint, timeout } => {
                tracing::info!(
                    "Payment strategy: remote push to {} (timeout {}s)",
                    endpoint,
                    timeout.as_secs()
                );
            }
        }
        tracing::debug!("Session TTL: {}s", config.session_ttl.as_secs());
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// How long an in-flight payment claim may live before it is dropped.
    pub fn in_flight_ttl(&self) -> Duration {
        match &self.payment_mode {
            PaymentMode::RemotePush { timeout, .. } => *timeout + Duration::from_secs(5),
            PaymentMode::Manual { .. } => Duration::from_secs(MAX_PAYMENT_TIMEOUT_SECS),
        }
    }
}

pub fn parse_endpoint(raw: &str) -> anyhow::Result<Url> {
    if raw.trim().is_empty() {
        anyhow::bail!("PAYMENT_ENDPOINT cannot be empty");
    }
    let url = Url::parse(raw.trim())
        .map_err(|e| anyhow::anyhow!("PAYMENT_ENDPOINT is not a valid URL: {}", e))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("PAYMENT_ENDPOINT must start with http:// or https://");
    }
    Ok(url)
}

pub fn payment_timeout(secs: u64) -> anyhow::Result<Duration> {
    if !(MIN_PAYMENT_TIMEOUT_SECS..=MAX_PAYMENT_TIMEOUT_SECS).contains(&secs) {
        anyhow::bail!(
            "PAYMENT_TIMEOUT_SECS must be between {} and {}",
            MIN_PAYMENT_TIMEOUT_SECS,
            MAX_PAYMENT_TIMEOUT_SECS
        );
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint() {
        assert!(parse_endpoint("https://pay.example.com/stk").is_ok());
        assert!(parse_endpoint("ftp://pay.example.com").is_err());
        assert!(parse_endpoint("  ").is_err());
        assert!(parse_endpoint("not a url").is_err());
    }

    #[test]
    fn test_payment_timeout_bounds() {
        assert!(payment_timeout(9).is_err());
        assert_eq!(payment_timeout(10).unwrap(), Duration::from_secs(10));
        assert_eq!(payment_timeout(30).unwrap(), Duration::from_secs(30));
        assert!(payment_timeout(31).is_err());
    }
}
